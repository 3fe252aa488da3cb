// Token issuer property tests

use sukashi::context::OperationContext;
use sukashi::definition::DefinitionId;
use sukashi::token::{Purpose, TokenError, TokenIssuer};

fn issuer() -> TokenIssuer {
    TokenIssuer::new(b"unit-test-secret".to_vec(), 300)
}

#[test]
fn test_every_purpose_validates_exactly_once() {
    // For all token purposes, validate(issue(p), p) succeeds exactly once;
    // a second validate on the same token fails
    let issuer = issuer();
    let ctx = OperationContext::new("editor");
    let purposes = [
        Purpose::ApplyAll,
        Purpose::ApplySingle(DefinitionId::new()),
        Purpose::RestoreBackup,
        Purpose::Autosave,
        Purpose::Preview,
    ];

    for purpose in purposes {
        let token = issuer.issue(&ctx, purpose.clone()).unwrap();

        assert!(
            issuer.validate(&ctx, &token, purpose.clone()).is_ok(),
            "first validation must succeed for {}",
            purpose
        );
        assert_eq!(
            issuer.validate(&ctx, &token, purpose.clone()),
            Err(TokenError::AlreadyConsumed),
            "second validation must be rejected for {}",
            purpose
        );
    }
}

#[test]
fn test_tokens_are_opaque_and_unique() {
    let issuer = issuer();
    let ctx = OperationContext::new("editor");

    let a = issuer.issue(&ctx, Purpose::ApplyAll).unwrap();
    let b = issuer.issue(&ctx, Purpose::ApplyAll).unwrap();

    // Same actor and purpose still mint distinct tokens (fresh jti)
    assert_ne!(a, b);

    // Both are independently consumable
    assert!(issuer.validate(&ctx, &a, Purpose::ApplyAll).is_ok());
    assert!(issuer.validate(&ctx, &b, Purpose::ApplyAll).is_ok());
}

#[test]
fn test_cross_purpose_replay_rejected() {
    let issuer = issuer();
    let ctx = OperationContext::new("editor");
    let token = issuer.issue(&ctx, Purpose::Preview).unwrap();

    // Presenting a preview token for a destructive purpose never works,
    // and the failed attempt does not consume the token
    assert!(matches!(
        issuer.validate(&ctx, &token, Purpose::RestoreBackup),
        Err(TokenError::PurposeMismatch { .. })
    ));
    assert!(issuer.validate(&ctx, &token, Purpose::Preview).is_ok());
}

#[test]
fn test_token_survives_transport_as_single_line() {
    let issuer = issuer();
    let ctx = OperationContext::new("editor");
    let token = issuer.issue(&ctx, Purpose::ApplyAll).unwrap();

    // Wire form is URL-safe: one line, no padding or reserved characters
    assert!(!token.contains('\n'));
    assert!(!token.contains('='));
    assert!(!token.contains('+'));
    assert!(!token.contains('/'));
    assert_eq!(token.matches('.').count(), 1);
}
