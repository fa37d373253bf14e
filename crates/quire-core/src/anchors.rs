use std::collections::HashMap;

/// Convert heading text into a stable anchor identifier.
pub fn generate_anchor(text: &str) -> String {
    let mut anchor = String::new();
    let mut last_was_dash = false;

    for ch in text.chars().flat_map(|c| c.to_lowercase()) {
        if ch.is_alphanumeric() {
            anchor.push(ch);
            last_was_dash = false;
        } else if (ch.is_whitespace() || ch == '-' || ch == '_')
            && !anchor.is_empty()
            && !last_was_dash
        {
            anchor.push('-');
            last_was_dash = true;
        }
    }

    if anchor.ends_with('-') {
        anchor.pop();
    }

    anchor
}

/// Hands out page-unique anchors, suffixing repeats with `-1`, `-2`, ...
#[derive(Debug, Default)]
pub struct AnchorRegistry {
    // anchor -> next suffix to try when it is requested again
    seen: HashMap<String, usize>,
}

impl AnchorRegistry {
    pub fn claim(&mut self, base: &str) -> String {
        let base = if base.is_empty() { "section" } else { base };
        let Some(&next) = self.seen.get(base) else {
            self.seen.insert(base.to_string(), 1);
            return base.to_string();
        };

        let mut suffix = next;
        let candidate = loop {
            let candidate = format!("{base}-{suffix}");
            suffix += 1;
            if !self.seen.contains_key(&candidate) {
                break candidate;
            }
        };
        self.seen.insert(base.to_string(), suffix);
        self.seen.insert(candidate.clone(), 1);
        candidate
    }
}
