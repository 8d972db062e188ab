use axum::response::{Html, IntoResponse};

/// `GET /`: single-page form that starts a session and tails its log.
pub async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>cartrunner</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 760px; margin: 2rem auto; padding: 0 1rem; }
  label { display: block; margin-top: .75rem; }
  input { width: 100%; padding: .4rem; box-sizing: border-box; }
  button { margin-top: 1rem; padding: .5rem 1.25rem; }
  #log { margin-top: 1.5rem; background: #111; color: #ddd; padding: 1rem; height: 360px;
         overflow-y: auto; font-family: ui-monospace, monospace; font-size: .85rem; }
  .success { color: #6c6; } .error { color: #e66; }
</style>
</head>
<body>
<h1>cartrunner</h1>
<form id="start">
  <label>Email <input name="email" type="email" required></label>
  <label>Password <input name="password" type="password" required></label>
  <label>Product URL <input name="product_url" type="url" required></label>
  <button type="submit">Start</button>
</form>
<div id="log"></div>
<script>
const log = document.getElementById('log');
function line(text, level) {
  const div = document.createElement('div');
  div.textContent = text;
  if (level) div.className = level;
  log.appendChild(div);
  log.scrollTop = log.scrollHeight;
}
document.getElementById('start').addEventListener('submit', async (ev) => {
  ev.preventDefault();
  log.innerHTML = '';
  const body = Object.fromEntries(new FormData(ev.target));
  const res = await fetch('/start', {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify(body),
  });
  const data = await res.json();
  if (!res.ok) { line(data.error || 'request failed', 'error'); return; }
  const source = new EventSource('/logs/' + data.session_id);
  source.onmessage = (msg) => {
    const rec = JSON.parse(msg.data);
    if (rec.ping) return;
    if (rec.error) { line(rec.error, 'error'); source.close(); return; }
    line('[' + rec.timestamp + '] ' + rec.message, rec.level);
    if (rec.message === 'COMPLETE' || rec.level === 'error') source.close();
  };
  source.onerror = () => source.close();
});
</script>
</body>
</html>
"#;
