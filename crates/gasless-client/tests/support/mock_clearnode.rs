//! Scripted clearing node
//!
//! Verifies every signature the client sends the way a real node would and
//! answers with the compact `res` envelope.

use alloy_primitives::Address;
use gasless_client::memory::Responder;
use gasless_core::eip712::{AuthPolicy, AuthTypedData, Eip712Domain};
use gasless_core::rpc::{
    AuthRequestParams, AuthVerifyParams, CreateAppSessionParams, RpcRequest, RpcResponse, methods,
};
use gasless_core::signer::{hash_eth_message, recover_address};
use gasless_core::types::keccak256_hash;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

/// How the node reacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Normal,
    /// Never answers
    Silent,
    /// Rejects `auth_verify` with an error echoing the request id
    RejectVerify,
    /// Rejects `create_app_session` with an error that carries no id
    ErrorOnCreate,
}

/// What the node observed, for assertions
#[derive(Debug, Default)]
pub struct NodeLog {
    pub methods: Vec<String>,
    pub authenticated: Option<Address>,
    pub sessions: Vec<CreateAppSessionParams>,
}

pub struct MockClearnode {
    behavior: Behavior,
    auth_chain_id: u64,
    pending: Option<(AuthRequestParams, String)>,
    authenticated: Option<Address>,
    log: Arc<Mutex<NodeLog>>,
}

impl MockClearnode {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            auth_chain_id: 8453,
            pending: None,
            authenticated: None,
            log: Arc::new(Mutex::new(NodeLog::default())),
        }
    }

    pub fn log(&self) -> Arc<Mutex<NodeLog>> {
        Arc::clone(&self.log)
    }

    pub fn into_responder(mut self) -> Responder {
        Box::new(move |text| self.respond(text))
    }

    /// Replies to one inbound frame
    pub fn respond(&mut self, text: &str) -> Vec<String> {
        if self.behavior == Behavior::Silent {
            return Vec::new();
        }
        let Ok((request, sigs)) = RpcRequest::parse(text) else {
            return vec![RpcResponse::error(0, "malformed request").to_envelope()];
        };
        self.log.lock().methods.push(request.method.clone());

        let reply = match request.method.as_str() {
            methods::AUTH_REQUEST => self.on_auth_request(&request, &sigs),
            methods::AUTH_VERIFY => self.on_auth_verify(&request, &sigs),
            methods::CREATE_APP_SESSION => self.on_create_session(&request, &sigs),
            other => RpcResponse::error(request.id, format!("unknown method {other}")),
        };
        vec![reply.to_envelope()]
    }

    fn on_auth_request(
        &mut self,
        request: &RpcRequest,
        sigs: &[gasless_core::Signature],
    ) -> RpcResponse {
        let Ok(params) = serde_json::from_value::<AuthRequestParams>(request.params[0].clone())
        else {
            return RpcResponse::error(request.id, "bad auth_request params");
        };
        let hash = keccak256_hash(&request.payload_bytes().unwrap());
        match sigs.first().map(|sig| recover_address(&hash, sig)) {
            Some(Ok(signer)) if signer == params.session_key => {}
            _ => return RpcResponse::error(request.id, "session key signature invalid"),
        }

        let challenge = format!("challenge-{}", uuid::Uuid::new_v4());
        self.pending = Some((params, challenge.clone()));
        RpcResponse::new(
            request.id,
            methods::AUTH_CHALLENGE,
            json!([{"challenge_message": challenge}]),
        )
    }

    fn on_auth_verify(
        &mut self,
        request: &RpcRequest,
        sigs: &[gasless_core::Signature],
    ) -> RpcResponse {
        if self.behavior == Behavior::RejectVerify {
            return RpcResponse::error(request.id, "verification denied");
        }
        let Some((params, challenge)) = self.pending.take() else {
            return RpcResponse::error(request.id, "no pending challenge");
        };
        let Ok(verify) = serde_json::from_value::<AuthVerifyParams>(request.params[0].clone())
        else {
            return RpcResponse::error(request.id, "bad auth_verify params");
        };
        if verify.challenge != challenge {
            return RpcResponse::error(request.id, "challenge mismatch");
        }

        let typed = AuthTypedData {
            domain: Eip712Domain::new(params.app_name.clone(), "1", self.auth_chain_id),
            message: AuthPolicy {
                challenge,
                scope: params.scope.clone(),
                wallet: params.address,
                application: params.application,
                participant: params.session_key,
                expire: params.expire.parse().unwrap_or_default(),
                allowances: params.allowances.clone(),
            },
        };
        match sigs.first().map(|sig| recover_address(&typed.signing_hash(), sig)) {
            Some(Ok(signer)) if signer == params.address => {}
            _ => return RpcResponse::error(request.id, "wallet signature invalid"),
        }

        self.authenticated = Some(params.address);
        self.log.lock().authenticated = Some(params.address);
        RpcResponse::new(
            request.id,
            methods::AUTH_VERIFY,
            json!([{
                "address": params.address,
                "session_key": params.session_key,
                "success": true,
                "jwt_token": "jwt",
            }]),
        )
    }

    fn on_create_session(
        &mut self,
        request: &RpcRequest,
        sigs: &[gasless_core::Signature],
    ) -> RpcResponse {
        if self.behavior == Behavior::ErrorOnCreate {
            return RpcResponse::error(0, "insufficient balance");
        }
        let Some(wallet) = self.authenticated else {
            return RpcResponse::error(request.id, "not authenticated");
        };
        let hash = hash_eth_message(&request.payload_bytes().unwrap());
        match sigs.first().map(|sig| recover_address(&hash, sig)) {
            Some(Ok(signer)) if signer == wallet => {}
            _ => return RpcResponse::error(request.id, "session signature invalid"),
        }
        let Ok(params) =
            serde_json::from_value::<CreateAppSessionParams>(request.params[0].clone())
        else {
            return RpcResponse::error(request.id, "bad create_app_session params");
        };

        let id = format!("0x{}", hex::encode(keccak256_hash(request.params.to_string().as_bytes())));
        self.log.lock().sessions.push(params);
        RpcResponse::new(
            request.id,
            methods::CREATE_APP_SESSION,
            json!([{"app_session_id": id, "status": "open"}]),
        )
    }
}
