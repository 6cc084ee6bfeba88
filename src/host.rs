//! Ways of exposing [`run_code`](crate::run_code) to a host.
//!
//! In a browser the function is published on the JS global object under
//! [`ENTRY_POINT`]. Natively [`serve`] speaks a line protocol where every
//! request and every response is one JSON string.

use std::io::{self, BufRead, Write};

/// Name the evaluation function is published under.
pub const ENTRY_POINT: &str = "runGoCode";

/// Block the calling thread for the rest of the process lifetime.
///
/// Used after the entry point is published so the host keeps it callable.
pub fn park_forever() -> ! {
    loop {
        std::thread::park();
    }
}

/// Answer requests from `input` until it is exhausted.
///
/// Each non-blank line must be a JSON string holding guest code; the reply
/// is `entry(code)` encoded as a JSON string on its own line. A line that
/// is not a JSON string is answered with a description of the problem.
pub fn serve<R, W>(input: R, mut output: W, entry: impl Fn(&str) -> String) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<String>(&line) {
            Ok(code) => entry(&code),
            Err(e) => {
                tracing::debug!(error = %e, "malformed request");
                format!("Error decoding request: {e}")
            }
        };

        serde_json::to_writer(&mut output, &response)?;
        output.write_all(b"\n")?;
        output.flush()?;
    }
    Ok(())
}

/// Serve requests from stdin on a worker thread, then park forever.
///
/// Returns only if the worker thread cannot be started.
#[cfg(not(target_arch = "wasm32"))]
pub fn serve_stdio_forever() -> io::Result<std::convert::Infallible> {
    std::thread::Builder::new()
        .name("stdio-host".to_string())
        .spawn(|| {
            let stdin = io::stdin().lock();
            let stdout = io::stdout().lock();
            match serve(stdin, stdout, crate::bridge::run_code) {
                Ok(()) => tracing::debug!("stdin closed"),
                Err(e) => tracing::error!(error = %e, "stdio host failed"),
            }
        })?;

    tracing::debug!(entry = ENTRY_POINT, "serving on stdio");
    park_forever()
}

#[cfg(target_arch = "wasm32")]
mod web {
    use super::ENTRY_POINT;
    use wasm_bindgen::prelude::*;

    /// Publishes the evaluation function on the JS global object.
    ///
    /// The closure is leaked; JS keeps calling it for the lifetime of the module.
    #[wasm_bindgen(start)]
    pub fn start() -> Result<(), JsValue> {
        let entry = Closure::<dyn Fn(String) -> String>::new(|code: String| {
            crate::bridge::run_code(&code)
        });
        js_sys::Reflect::set(
            &js_sys::global(),
            &JsValue::from_str(ENTRY_POINT),
            entry.as_ref(),
        )?;
        entry.forget();
        tracing::debug!(entry = ENTRY_POINT, "entry point registered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn serve_str(input: &str) -> String {
        let mut output = Vec::new();
        serve(Cursor::new(input), &mut output, crate::bridge::run_code).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_serve_answers_each_line() {
        let output = serve_str("\"echo hello\"\n\n\"echo a; echo b >&2\"\n");
        assert_eq!(output, "\"hello\\n\"\n\"a\\n\\n--- STDERR ---\\nb\\n\"\n");
    }

    #[test]
    fn test_serve_reports_malformed_lines() {
        let output = serve_str("echo hello\n\"echo ok\"\n");
        let replies: Vec<String> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(replies.len(), 2);
        assert!(replies[0].starts_with("Error decoding request: "));
        assert_eq!(replies[1], "ok\n");
    }

    #[test]
    fn test_serve_uses_given_entry() {
        let mut output = Vec::new();
        serve(Cursor::new("\"x\"\n"), &mut output, |code| code.to_uppercase()).unwrap();
        assert_eq!(output, b"\"X\"\n");
    }
}
