// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn tokens() -> StaticTokens {
    StaticTokens::new(vec![
        TokenEntry { token: "tok-alice".into(), user_id: "u1".into(), username: "alice".into() },
        TokenEntry { token: "tok-bob".into(), user_id: "u2".into(), username: "bob".into() },
    ])
}

#[test]
fn constant_time_eq_matches() {
    assert!(constant_time_eq("abc", "abc"));
    assert!(!constant_time_eq("abc", "abd"));
    assert!(!constant_time_eq("abc", "ab"));
    assert!(constant_time_eq("", ""));
}

#[test]
fn static_tokens_resolve_identity() -> anyhow::Result<()> {
    let auth = tokens();
    let who = auth.verify("tok-bob")?;
    assert_eq!(who.user_id, "u2");
    assert_eq!(who.username, "bob");
    Ok(())
}

#[yare::parameterized(
    unknown   = { "tok-mallory" },
    empty     = { "" },
    prefix    = { "tok-ali" },
)]
fn static_tokens_reject(token: &str) {
    assert_eq!(tokens().verify(token), Err(BrokerError::Unauthorized));
}

#[test]
fn dev_auth_uses_token_as_user() -> anyhow::Result<()> {
    let who = DevAuth.verify("alice")?;
    assert_eq!(who, Identity { user_id: "alice".into(), username: "alice".into() });
    assert_eq!(DevAuth.verify("   "), Err(BrokerError::Unauthorized));
    Ok(())
}

#[test]
fn load_rejects_shared_tokens() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("roomcast-tokens-{}.json", std::process::id()));
    std::fs::write(
        &path,
        r#"[{"token":"t","user_id":"u1","username":"a"},{"token":"t","user_id":"u2","username":"b"}]"#,
    )?;
    let result = StaticTokens::load(&path);
    let _ = std::fs::remove_file(&path);

    let err = result.err().ok_or_else(|| anyhow::anyhow!("expected load error"))?;
    assert!(err.to_string().contains("shared by users"), "error: {err}");
    Ok(())
}

#[test]
fn load_reads_entries() -> anyhow::Result<()> {
    let path =
        std::env::temp_dir().join(format!("roomcast-tokens-ok-{}.json", std::process::id()));
    std::fs::write(&path, r#"[{"token":"abc","user_id":"u1","username":"alice"}]"#)?;
    let result = StaticTokens::load(&path);
    let _ = std::fs::remove_file(&path);

    let auth = result?;
    assert_eq!(auth.len(), 1);
    assert_eq!(auth.verify("abc")?.username, "alice");
    Ok(())
}
