//! Authentication-lifecycle handlers: `challenge`, `auth`, `auth_success`,
//! `auth_error`, `auth_required`.

use async_trait::async_trait;
use teneo_types::{AuthInboundData, AuthState, ChallengeData, Event, Message, MessageType, SdkError};

use super::{Context, Handler};

pub struct ChallengeHandler;

#[async_trait]
impl Handler for ChallengeHandler {
    fn message_type(&self) -> MessageType {
        MessageType::Challenge
    }

    async fn handle(&self, message: &Message, ctx: &dyn Context) -> Result<(), SdkError> {
        let Some(data) = ChallengeData::from_message(message) else {
            return Err(SdkError::Validation("challenge frame missing challenge value".into()));
        };
        ctx.set_challenge(data.challenge.clone()).await;
        ctx.emit(Event::AuthChallenge {
            challenge: data.challenge.clone(),
        });

        let signed_string = format!("Teneo authentication challenge: {}", data.challenge);
        let signature = ctx.sign(&signed_string).await?;

        let mut auth = Message::new("auth");
        auth.data = Some(serde_json::json!({
            "address": ctx.self_address(),
            "signature": signature,
            "message": signed_string,
            "client_type": ctx.client_type().as_str(),
        }));
        ctx.send(auth).await
    }
}

pub struct AuthHandler;

#[async_trait]
impl Handler for AuthHandler {
    fn message_type(&self) -> MessageType {
        MessageType::Auth
    }

    async fn handle(&self, message: &Message, ctx: &dyn Context) -> Result<(), SdkError> {
        let data = AuthInboundData::from_message(message);
        if data.is_authenticating(&ctx.self_address()) {
            apply_successful_auth(data, ctx).await;
        }
        Ok(())
    }
}

pub struct AuthSuccessHandler;

#[async_trait]
impl Handler for AuthSuccessHandler {
    fn message_type(&self) -> MessageType {
        MessageType::AuthSuccess
    }

    async fn handle(&self, message: &Message, ctx: &dyn Context) -> Result<(), SdkError> {
        let data = AuthInboundData::from_message(message);
        apply_successful_auth(data, ctx).await;
        Ok(())
    }
}

/// Shared by `auth` (when it carries identity evidence) and the legacy `auth_success`
/// tag: both populate [`AuthState`] identically per `spec.md` §4.2.
async fn apply_successful_auth(data: AuthInboundData, ctx: &dyn Context) {
    let rooms = data.rooms.clone();
    let wallet_address = data.address.clone().unwrap_or_else(|| ctx.self_address());

    if let Some(expected) = ctx.expected_address() {
        if !expected.eq_ignore_ascii_case(&wallet_address) {
            let reason = format!(
                "authenticated address {wallet_address} does not match expected address {expected}"
            );
            ctx.set_auth_error(reason.clone()).await;
            ctx.emit(Event::AuthError(reason));
            return;
        }
    }

    ctx.seed_rooms(rooms.clone(), data.private_room_id.clone()).await;

    let state = AuthState {
        authenticated: true,
        client_id: data.id,
        wallet_address: Some(wallet_address),
        is_whitelisted: data.is_whitelisted,
        is_admin: data.is_admin_whitelisted,
        nft_verified: data.nft_verified,
        rooms: rooms.iter().map(|r| r.id.clone()).collect(),
        room_objects: rooms,
        private_room_id: data.private_room_id,
        challenge: None,
    };
    ctx.set_authenticated(state.clone()).await;
    ctx.emit(Event::AuthSuccess(state));
    ctx.emit(Event::Ready);
}

pub struct AuthErrorHandler;

#[async_trait]
impl Handler for AuthErrorHandler {
    fn message_type(&self) -> MessageType {
        MessageType::AuthError
    }

    async fn handle(&self, message: &Message, ctx: &dyn Context) -> Result<(), SdkError> {
        let reason = message
            .content
            .clone()
            .or_else(|| {
                message
                    .data
                    .as_ref()
                    .and_then(|d| d.get("message"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "authentication rejected".to_string());
        ctx.set_auth_error(reason.clone()).await;
        ctx.emit(Event::AuthError(reason));
        Ok(())
    }
}

pub struct AuthRequiredHandler;

#[async_trait]
impl Handler for AuthRequiredHandler {
    fn message_type(&self) -> MessageType {
        MessageType::AuthRequired
    }

    async fn handle(&self, _message: &Message, ctx: &dyn Context) -> Result<(), SdkError> {
        ctx.set_auth_required();
        ctx.emit(Event::AuthRequired);
        Ok(())
    }
}
