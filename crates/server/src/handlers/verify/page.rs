use axum::{extract::Query, response::Html};
use serde::Deserialize;

/// Query string carrying the verify token.
#[derive(Deserialize)]
pub(super) struct PageQuery {
    #[serde(default)]
    token: String,
}

/// Serve the static signing page.
///
/// The page embeds the verify token; the in-browser wallet flow fetches
/// the challenge and posts the signature against the JSON routes.
/// Anything outside the base64url-plus-dot token alphabet is dropped
/// before embedding.
pub(super) async fn page(Query(query): Query<PageQuery>) -> Html<String> {
    let token = query
        .token
        .bytes()
        .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.'))
        .then_some(query.token)
        .unwrap_or_default();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Wallet verification</title>
</head>
<body data-verify-token="{token}">
    <main>
        <h1>Verify your wallet</h1>
        <p>Connect your wallet and sign the verification message to link it
        to your Discord account. Signing is free and submits no transaction.</p>
        <button id="connect">Connect wallet</button>
        <p id="status"></p>
    </main>
    <script src="/static/verify.js" defer></script>
</body>
</html>
"#,
    ))
}
