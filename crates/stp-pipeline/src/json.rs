/// Find the first top-level JSON object in free text that satisfies `accept`.
///
/// Inbound tickets arrive bare, inside a markdown code fence, or pasted into an
/// email body. Scanning starts at each `{`; the streaming deserializer reads one
/// value from there and, when it parses, the scan resumes after that value, so
/// objects nested inside a parsed one are never tried on their own.
pub fn find_object<F>(text: &str, accept: F) -> Option<serde_json::Value>
where
    F: Fn(&serde_json::Value) -> bool,
{
    let mut pos = 0;
    while let Some(found) = text[pos..].find('{') {
        let start = pos + found;
        let mut stream =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<serde_json::Value>();
        match stream.next() {
            Some(Ok(value)) => {
                if accept(&value) {
                    return Some(value);
                }
                pos = start + stream.byte_offset();
            }
            _ => pos = start + 1,
        }
    }
    None
}
