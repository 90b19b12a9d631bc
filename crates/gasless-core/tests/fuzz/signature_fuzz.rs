//! Fuzz tests for signature recovery

use gasless_core::signer::recover_address;
use gasless_core::{LocalWallet, SessionKey, Signature};
use proptest::prelude::*;

fn hash_strategy() -> impl Strategy<Value = [u8; 32]> {
    prop::array::uniform32(any::<u8>())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any digest signed by a wallet recovers to that wallet
    #[test]
    fn wallet_sign_recover(hash in hash_strategy()) {
        let wallet = LocalWallet::random(8453);
        let sig = wallet.sign_hash(&hash).unwrap();
        prop_assert_eq!(recover_address(&hash, &sig).unwrap(), gasless_core::WalletSigner::address(&wallet));
    }

    /// Session keys sign like wallets
    #[test]
    fn session_key_sign_recover(hash in hash_strategy()) {
        let key = SessionKey::generate();
        let sig = key.sign_hash(&hash).unwrap();
        prop_assert_eq!(recover_address(&hash, &sig).unwrap(), key.address());
    }

    /// Parsing arbitrary 65-byte blobs never panics
    #[test]
    fn signature_parse_total(bytes in prop::collection::vec(any::<u8>(), 0..80)) {
        let parsed = Signature::from_bytes(&bytes);
        if bytes.len() != 65 {
            prop_assert!(parsed.is_err());
        } else if let Ok(sig) = parsed {
            prop_assert!(sig.recovery_id <= 1);
        }
    }
}
