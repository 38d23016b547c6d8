use scraper::{Html, Selector};
use std::thread;

use crate::constants::*;
use crate::errors::ScrapeError;
use crate::imports::*;
use crate::macros::*;
use crate::script::{Limits, Sandbox, ScriptError, Value};
use crate::types::RedirectTarget;

// The interpreter recurses along the script's nesting, so it runs on its own thread with enough stack for the
// sandbox's nesting and memory limits to trip first, including while dropping what the script built.
const SCRIPT_STACK_SIZE: usize = 64 * 1024 * 1024;

fn malformed(reason: impl Into<String>) -> anyhow::Error {
    ScrapeError::MalformedGatePage(reason.into()).into()
}

pub fn extract_script(body: &str) -> Result<String> {
    let document = Html::parse_document(body);
    let mut script_elems = document.select(selector!("script")).peekable();
    if script_elems.peek().is_none() {
        return Err(malformed("No script element in gate page"));
    }
    let script: String = script_elems.flat_map(|elem| elem.text()).collect();
    if script.trim().is_empty() {
        return Err(malformed("Gate page script is empty"));
    }
    Ok(script)
}

/// Strips the load hook so the script body runs as soon as it is evaluated.
pub fn neutralize_entry_point(script: &str) -> String {
    regex!(r"window\.onload\s*=").replace(script, "").into_owned()
}

pub fn replace_last(text: &str, from: &str, to: &str) -> String {
    match text.rfind(from) {
        Some(index) => format!("{}{}{}", &text[..index], to, &text[index + from.len()..]),
        None => text.to_string(),
    }
}

/// Turns the gate script into one that hands its navigation statement to the capture function.
///
/// Only the last `eval` is the navigation; earlier ones decode the payload and must keep working.
pub fn rewrite_script(script: &str) -> String {
    let script = neutralize_entry_point(script);
    format!("{}{}", CAPTURE_PRELUDE, replace_last(&script, EXEC_TOKEN, CAPTURE_FUNCTION))
}

pub fn evaluate_capture(source: String, limits: Limits) -> Result<String> {
    let handle = thread::Builder::new()
        .name("gate-script".to_string())
        .stack_size(SCRIPT_STACK_SIZE)
        .spawn(move || -> Result<Option<String>, ScriptError> {
            let mut sandbox = Sandbox::new(limits);
            sandbox.run(&source)?;
            Ok(match sandbox.global(CAPTURE_VARIABLE) {
                Some(Value::Str(captured)) => Some(captured.to_string()),
                _ => None,
            })
        })
        .context("Failed to start gate script thread")?;
    let outcome = handle.join().map_err(|_| malformed("Gate script evaluation panicked"))?;
    let captured = outcome.map_err(|err| malformed(format!("Gate script evaluation failed: {}", err)))?;
    captured.ok_or_else(|| malformed("Gate script never passed a string to the capture function"))
}

/// Slices the path out of a captured `location="/path?token=..."` statement: from the first `/` up to
/// (not including) the last `"`.
pub fn parse_redirect_target(captured: &str) -> Result<RedirectTarget> {
    let start = captured.find('/').ok_or_else(|| malformed(format!("No '/' in navigation: {:?}", captured)))?;
    let end = captured.rfind('"').ok_or_else(|| malformed(format!("No '\"' in navigation: {:?}", captured)))?;
    if end <= start {
        return Err(malformed(format!("Empty path in navigation: {:?}", captured)));
    }
    Ok(RedirectTarget::new(&captured[start..end]))
}

pub fn resolve_redirect(body: &str, limits: Limits) -> Result<RedirectTarget> {
    let inner = || {
        let script = extract_script(body)?;
        let captured = evaluate_capture(rewrite_script(&script), limits)?;
        debug!("Gate script navigates with: {:?}", captured);
        parse_redirect_target(&captured)
    };
    inner().context("Failed to resolve gate page redirect")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_malformed(error: &anyhow::Error) -> bool {
        matches!(ScrapeError::find(error), Some(ScrapeError::MalformedGatePage(_)))
    }

    // Same shape as the site's gate: a load hook that schedules a decoder, a decoding pass run through an
    // inner `eval`, and a final `eval` of the decoded navigation.
    fn gate_page(target: &str, key: u8) -> String {
        let navigation = format!("location=\"{}\"", target);
        let codes: Vec<String> =
            navigation.bytes().map(|b| format!("0x{:x}", (u16::from(b ^ key) + 3) & 0xff)).collect();
        format!(
            "<html><body><script language=\"javascript\"> window.onload=setTimeout(\"cx({key})\", 200); \
             function cx(KR) {{ var qo, po = \"\", oo = [{codes}]; \
             qo = \"qo=oo.length-1; do{{oo[qo]=(oo[qo]-3)&0xff;}}while(--qo>=0);\"; eval(qo); \
             for (qo = 0; qo < oo.length; qo++) po += String.fromCharCode(oo[qo] ^ KR); \
             eval(\"qo=eval;qo(po);\"); }} </script> </body></html>",
            key = key,
            codes = codes.join(",")
        )
    }

    #[test]
    fn test_resolve_gate_page() -> Result<()> {
        let target = resolve_redirect(&gate_page("/gxyxqk/index.jhtml?token=a1b2c3", 93), Limits::default())?;
        assert_eq!(target.as_str(), "/gxyxqk/index.jhtml?token=a1b2c3");
        Ok(())
    }

    #[test]
    fn test_parse_redirect_target() -> Result<()> {
        assert_eq!(parse_redirect_target("location=\"/foo/bar?token=abc123\"")?.as_str(), "/foo/bar?token=abc123");
        assert_eq!(parse_redirect_target("window.location = \"/a/b\";")?.as_str(), "/a/b");
        assert!(is_malformed(&parse_redirect_target("location=/foo/bar").unwrap_err()));
        assert!(is_malformed(&parse_redirect_target("location=\"foo\"").unwrap_err()));
        assert!(is_malformed(&parse_redirect_target("\"\"/").unwrap_err()));
        Ok(())
    }

    #[test]
    fn test_replace_last_targets_final_occurrence() {
        let script = "eval(a); x = 'medieval'; eval(\"qo=eval;qo(po);\")";
        let last = script.rfind("eval").unwrap();
        let rewritten = replace_last(script, "eval", "setFinalJs");
        assert_eq!(&rewritten[..last], &script[..last]);
        assert_eq!(rewritten, "eval(a); x = 'medieval'; eval(\"qo=setFinalJs;qo(po);\")");
        assert_eq!(replace_last("no calls", "eval", "setFinalJs"), "no calls");
    }

    #[test]
    fn test_rewrite_script() {
        let rewritten = rewrite_script("window.onload = setTimeout(\"f()\", 1); function f() { eval(p); }");
        assert_eq!(
            rewritten,
            "var FINAL_JS; function setFinalJs(js){FINAL_JS = js;} setTimeout(\"f()\", 1); function f() { setFinalJs(p); }"
        );
    }

    #[test]
    fn test_extract_script_requires_script_element() {
        assert!(is_malformed(&extract_script("<html><body><p>nothing</p></body></html>").unwrap_err()));
        assert!(is_malformed(&extract_script("<html><body><script></script></body></html>").unwrap_err()));
    }

    #[test]
    fn test_script_without_capture_is_malformed() {
        let body = "<html><body><script language=\"javascript\">var x = 1;</script></body></html>";
        assert!(is_malformed(&resolve_redirect(body, Limits::default()).unwrap_err()));
    }

    #[test]
    fn test_script_touching_browser_objects_is_malformed() {
        let body = "<html><body><script language=\"javascript\">window.onload=function(){};\
                    document.cookie = 'a=b'; eval('location=\"/x\"');</script></body></html>";
        assert!(is_malformed(&resolve_redirect(body, Limits::default()).unwrap_err()));
    }

    #[test]
    fn test_self_evaluating_script_is_malformed() {
        let body = "<html><body><script language=\"javascript\">var s = 'eval(s)'; eval(s); \
                    eval('location=\"/x\"');</script></body></html>";
        let error = resolve_redirect(body, Limits::default()).unwrap_err();
        assert!(is_malformed(&error));
        assert!(format!("{:#}", error).contains("depth"));
    }

    #[test]
    fn test_memory_hungry_script_is_malformed() {
        let body = "<html><body><script language=\"javascript\">var s = 'a'; for (var i = 0; i < 40; i++) { s += s; } \
                    eval('location=\"/x\"');</script></body></html>";
        let error = resolve_redirect(body, Limits::default()).unwrap_err();
        assert!(is_malformed(&error));
        assert!(format!("{:#}", error).contains("memory"));
    }

    #[test]
    fn test_non_terminating_script_is_malformed() {
        let body = "<html><body><script language=\"javascript\">while (1) {} eval('location=\"/x\"');</script></body></html>";
        let limits = Limits { max_steps: 50_000, ..Limits::default() };
        assert!(is_malformed(&resolve_redirect(body, limits).unwrap_err()));
    }
}
