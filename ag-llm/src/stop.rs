/// Strips trailing stop sequences a backend echoed back.
///
/// Each sequence is tried once, in order, against the text as left by the
/// previous ones.
pub fn remove_stop_sequences(text: &str, stop_sequences: &[String]) -> String {
    let mut out = text;
    for stop in stop_sequences {
        if let Some(rest) = out.strip_suffix(stop.as_str()) {
            out = rest;
        }
    }
    out.to_string()
}

/// Incremental stopping criterion for token-by-token generation.
///
/// Engines feed each decoded piece to [`StopOnStrings::push`] and stop once it
/// returns `true`.
#[derive(Debug, Clone, Default)]
pub struct StopOnStrings {
    stop_strings: Vec<String>,
    stream: String,
}

impl StopOnStrings {
    pub fn new(stop_strings: &[String]) -> Self {
        Self {
            stop_strings: stop_strings
                .iter()
                .filter(|s| !s.is_empty())
                .cloned()
                .collect(),
            stream: String::new(),
        }
    }

    pub fn push(&mut self, piece: &str) -> bool {
        self.stream.push_str(piece);
        self.stop_strings.iter().any(|s| self.stream.ends_with(s))
    }

    pub fn reset(&mut self) {
        self.stream.clear();
    }
}
