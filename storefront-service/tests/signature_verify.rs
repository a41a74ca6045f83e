use hmac::{Hmac, Mac};
use sha2::Sha256;
use storefront_service::gateway::{PaymentGateway, StubGateway};

fn reference_signature(secret: &str, intent_id: &str, payment_id: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{intent_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[test]
fn only_the_exact_hmac_hex_verifies() {
    let gw = StubGateway::new("kHatA_secret_42");
    let valid = reference_signature("kHatA_secret_42", "order_ABC", "pay_XYZ");

    assert!(gw.verify_signature("order_ABC", "pay_XYZ", &valid));

    // empty and truncated signatures
    assert!(!gw.verify_signature("order_ABC", "pay_XYZ", ""));
    assert!(!gw.verify_signature("order_ABC", "pay_XYZ", &valid[..valid.len() - 1]));
    assert!(!gw.verify_signature("order_ABC", "pay_XYZ", &valid[..32]));

    // single flipped character
    let mut corrupted = valid.clone();
    let flipped = if corrupted.ends_with('0') { '1' } else { '0' };
    corrupted.pop();
    corrupted.push(flipped);
    assert!(!gw.verify_signature("order_ABC", "pay_XYZ", &corrupted));

    // case change (hex is emitted lowercase)
    assert!(!gw.verify_signature("order_ABC", "pay_XYZ", &valid.to_uppercase()));

    // trailing garbage
    assert!(!gw.verify_signature("order_ABC", "pay_XYZ", &format!("{valid}a")));
}

#[test]
fn signature_is_bound_to_the_id_pair() {
    let gw = StubGateway::new("kHatA_secret_42");
    let valid = reference_signature("kHatA_secret_42", "order_ABC", "pay_XYZ");

    assert!(!gw.verify_signature("order_DEF", "pay_XYZ", &valid));
    assert!(!gw.verify_signature("order_ABC", "pay_UVW", &valid));
    // swapping the pair must not verify either
    assert!(!gw.verify_signature("pay_XYZ", "order_ABC", &valid));
}

#[test]
fn signature_depends_on_the_secret() {
    let gw = StubGateway::new("secret_a");
    let other = reference_signature("secret_b", "order_ABC", "pay_XYZ");
    assert!(!gw.verify_signature("order_ABC", "pay_XYZ", &other));
}

#[test]
fn stub_sign_matches_the_reference_construction() {
    let gw = StubGateway::new("kHatA_secret_42");
    assert_eq!(
        gw.sign("order_ABC", "pay_XYZ"),
        reference_signature("kHatA_secret_42", "order_ABC", "pay_XYZ")
    );
}
