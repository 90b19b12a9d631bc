//! Integration test: a swap update signed by both parties
//!
//! Mirrors what the client pipeline and the relay do with one update:
//! the user signs, the update is serialized across a boundary, the relay
//! verifies and co-signs, and the result is executable.

use alloy_primitives::U256;
use gasless_core::signer::recover_address;
use gasless_core::tokens::{USDC, WETH};
use gasless_core::{
    AllocationDelta, IntentKind, LocalWallet, MockRouteProvider, QuoteRequest, RoleSignature,
    RouteProvider, SignerRole, StateUpdate, SwapIntent, WalletSigner,
};

#[tokio::test]
async fn test_user_and_relay_cosign_update() {
    let user = LocalWallet::random(8453);
    let relay = LocalWallet::random(8453);

    let quote = MockRouteProvider::default()
        .get_route(&QuoteRequest::new(USDC.address, WETH.address, 5_000_000))
        .await
        .unwrap()
        .unwrap();

    let intent = SwapIntent::ExecuteSwap {
        route_id: quote.route.id.clone(),
        session_id: "0xsession".into(),
        call_digest: quote.route.first_call().unwrap().digest(),
    };
    let mut update = StateUpdate {
        session_id: "0xsession".into(),
        intent: IntentKind::ExecuteSwap,
        version: 1,
        data: serde_json::to_string(&intent).unwrap(),
        target: relay.address(),
        value: U256::ZERO,
        allocations: vec![
            AllocationDelta {
                participant: user.address(),
                asset: "usdc".into(),
                delta: -(quote.from_amount as i128),
            },
            AllocationDelta {
                participant: relay.address(),
                asset: "usdc".into(),
                delta: quote.from_amount as i128,
            },
        ],
        signatures: vec![],
    };

    // User side
    let payload = update.signing_payload().unwrap();
    let user_sig = user.sign_message(&payload).await.unwrap();
    update
        .add_signature(RoleSignature {
            role: SignerRole::User,
            signer: user.address(),
            signature: user_sig,
        })
        .unwrap();
    assert!(!update.is_executable());

    // Cross the boundary
    let wire = serde_json::to_string(&update).unwrap();
    let mut received: StateUpdate = serde_json::from_str(&wire).unwrap();
    assert_eq!(received, update);

    // Relay side
    let hash = received.signing_hash().unwrap();
    let user_entry = received.signature_for(SignerRole::User).unwrap();
    assert_eq!(recover_address(&hash, &user_entry.signature).unwrap(), user.address());

    let relay_sig = relay.sign_message(&received.signing_payload().unwrap()).await.unwrap();
    received
        .add_signature(RoleSignature {
            role: SignerRole::Counterparty,
            signer: relay.address(),
            signature: relay_sig,
        })
        .unwrap();

    assert!(received.is_executable());
    assert!(received.allocations_balanced());
    assert_eq!(
        recover_address(&hash, &received.signature_for(SignerRole::Counterparty).unwrap().signature)
            .unwrap(),
        relay.address()
    );
    assert_eq!(received.intent_payload().unwrap(), intent);
}
