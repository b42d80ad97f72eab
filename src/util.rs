/// `<base>/<segment>/.../` with exactly one slash between parts and a
/// trailing slash, which the series API expects on every resource path.
pub(crate) fn join_segments<I, S>(base: &str, segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = format!("{}/", base.trim_end_matches('/'));
    for segment in segments {
        let segment = segment.as_ref().trim_matches('/');
        if segment.is_empty() {
            continue;
        }
        out.push_str(segment);
        out.push('/');
    }
    out
}

/// Text form of a JSON value used as a column name: strings verbatim,
/// everything else as its JSON rendering.
pub(crate) fn value_label(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
