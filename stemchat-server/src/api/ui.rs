//! UI route - single HTML page with the chat client
//!
//! Vanilla JS: the page opens `/ws`, shows every server message, uploads
//! through `/upload/` and then sends `uploaded:<name>`. When the server
//! announces the download it fetches `/download/all`.

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Router,
};

use crate::AppState;

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new().route("/", get(root_page))
}

/// Root page - chat client
async fn root_page() -> impl IntoResponse {
    Html(
        r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>stemchat</title>
    <style>
        body {
            font-family: system-ui, -apple-system, sans-serif;
            max-width: 800px;
            margin: 40px auto;
            padding: 20px;
            line-height: 1.6;
        }
        h1 {
            color: #333;
            border-bottom: 2px solid #0066cc;
            padding-bottom: 10px;
        }
        #log {
            border: 1px solid #ccc;
            border-radius: 4px;
            height: 360px;
            overflow-y: auto;
            padding: 10px;
            white-space: pre-wrap;
            background: #fafafa;
        }
        .server { color: #0052a3; }
        .client { color: #333; text-align: right; }
        form { margin-top: 10px; display: flex; gap: 8px; }
        input[type=text] { flex: 1; padding: 8px; }
        button {
            padding: 8px 16px;
            background: #0066cc;
            color: white;
            border: none;
            border-radius: 4px;
        }
        button:hover { background: #0052a3; }
    </style>
</head>
<body>
    <h1>stemchat</h1>
    <div id="log"></div>

    <form id="chat">
        <input type="text" id="message" placeholder="Type 1, 2, 3, a song name, or yes/no" autocomplete="off">
        <button type="submit">Send</button>
    </form>

    <form id="upload">
        <input type="file" id="file" accept=".wav,.mp3">
        <button type="submit">Upload</button>
    </form>

    <script>
        const log = document.getElementById('log');
        const scheme = location.protocol === 'https:' ? 'wss' : 'ws';
        const socket = new WebSocket(`${scheme}://${location.host}/ws`);

        function append(text, cls) {
            const line = document.createElement('div');
            line.className = cls;
            line.textContent = text;
            log.appendChild(line);
            log.scrollTop = log.scrollHeight;
        }

        socket.onmessage = (event) => {
            append(event.data, 'server');
            if (event.data === 'Downloading files.') {
                window.location.href = '/download/all';
            }
        };
        socket.onclose = () => append('Connection closed.', 'server');

        document.getElementById('chat').addEventListener('submit', (e) => {
            e.preventDefault();
            const input = document.getElementById('message');
            socket.send(input.value);
            append(input.value, 'client');
            input.value = '';
        });

        document.getElementById('upload').addEventListener('submit', async (e) => {
            e.preventDefault();
            const file = document.getElementById('file').files[0];
            if (!file) {
                socket.send('no file');
                return;
            }
            const form = new FormData();
            form.append('file', file);
            const response = await fetch('/upload/', { method: 'POST', body: form });
            if (response.ok) {
                socket.send(`uploaded:${file.name}`);
                append(`uploaded:${file.name}`, 'client');
            } else {
                const body = await response.json();
                append(`Upload failed: ${body.error.message}`, 'server');
            }
        });
    </script>
</body>
</html>
"#,
    )
}
