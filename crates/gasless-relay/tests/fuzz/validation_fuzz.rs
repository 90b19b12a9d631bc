//! Fuzz tests for relay request validation
//!
//! Nothing that fails validation may reach the broadcaster.

use crate::support::{Backend, quote, signed_request};
use alloy_primitives::{Address, hex};
use gasless_core::{LocalWallet, RoleSignature, SignerRole, WalletSigner};
use proptest::prelude::*;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Well-formed proposals execute and keep allocations conserved
    #[test]
    fn fuzz_valid_proposals_execute(amount in 1u128..1_000_000_000_000u128) {
        runtime().block_on(async {
            let backend = Backend::new();
            let user = LocalWallet::random(8453);
            let quote = quote(amount).await;
            let request = signed_request(&user, backend.address(), &quote, None).await;

            let response = backend.service.execute_swap(request).await.unwrap();
            assert!(response.success);

            let updates = backend.sink.updates.lock();
            assert!(updates[0].allocations_balanced());
            let credited: i128 = updates[0]
                .allocations
                .iter()
                .filter(|d| d.participant == backend.address())
                .map(|d| d.delta)
                .sum();
            assert_eq!(credited, amount as i128);
        });
    }

    /// A user-signed but unbalanced update never executes
    #[test]
    fn fuzz_unbalanced_allocations_rejected(
        amount in 1u128..1_000_000_000u128,
        skew in prop_oneof![-1_000_000i128..-1, 1i128..1_000_000],
    ) {
        runtime().block_on(async {
            let backend = Backend::new();
            let user = LocalWallet::random(8453);
            let quote = quote(amount).await;
            let mut request = signed_request(&user, backend.address(), &quote, None).await;

            if let Some(update) = request.signed_state_update.as_mut() {
                update.allocations[1].delta += skew;
                update.signatures.clear();
                let signature = user.sign_message(&update.signing_payload().unwrap()).await.unwrap();
                update
                    .add_signature(RoleSignature {
                        role: SignerRole::User,
                        signer: user.address(),
                        signature,
                    })
                    .unwrap();
            }

            let err = backend.service.execute_swap(request).await.unwrap_err();
            assert_eq!(err.code(), "invalid_request");
            assert_eq!(backend.broadcaster.calls(), 0);
        });
    }

    /// A call other than the one the user signed is never broadcast
    #[test]
    fn fuzz_rewritten_call_rejected(
        target in any::<[u8; 20]>(),
        selector in any::<[u8; 4]>(),
        value in 1u128..u128::MAX,
    ) {
        runtime().block_on(async {
            let backend = Backend::new();
            let user = LocalWallet::random(8453);
            let quote = quote(5_000_000).await;
            let mut request = signed_request(&user, backend.address(), &quote, None).await;

            if let Some(route) = request.proposed_route.as_mut()
                && let Some(call) = route.steps[0].transaction_request.as_mut()
            {
                call.to = Some(Address::from(target).to_checksum(None));
                call.data = Some(format!("0x{}", hex::encode(selector)));
                call.value = Some(value.to_string());
            }

            let err = backend.service.execute_swap(request).await.unwrap_err();
            assert_eq!(err.code(), "invalid_route");
            assert_eq!(backend.broadcaster.calls(), 0);
        });
    }

    /// Any corruption of the user signature is unauthorized
    #[test]
    fn fuzz_corrupted_user_signature_rejected(index in 0usize..64, flip in 1u8..=255) {
        runtime().block_on(async {
            let backend = Backend::new();
            let user = LocalWallet::random(8453);
            let quote = quote(5_000_000).await;
            let mut request = signed_request(&user, backend.address(), &quote, None).await;

            if let Some(update) = request.signed_state_update.as_mut() {
                let sig = &mut update.signatures[0].signature;
                if index < 32 {
                    sig.r[index] ^= flip;
                } else {
                    sig.s[index - 32] ^= flip;
                }
            }

            let err = backend.service.execute_swap(request).await.unwrap_err();
            assert_eq!(err.code(), "unauthorized");
            assert_eq!(backend.broadcaster.calls(), 0);
            assert!(backend.sink.updates.lock().is_empty());
        });
    }
}
