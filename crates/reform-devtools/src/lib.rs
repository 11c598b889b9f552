use web_time::{Duration, Instant};

use reform_core::{FormKey, FormRegistry};

/// One registry entry as seen by the inspector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormSummary {
    pub key: FormKey,
    pub valid: bool,
    pub touched: bool,
    pub dirty: bool,
    pub leaf_count: usize,
}

impl FormSummary {
    fn line(&self, hovered: bool) -> String {
        format!(
            "{} {}  {}{}{}  leaves: {}",
            if hovered { ">" } else { " " },
            self.key,
            if self.valid { "valid" } else { "INVALID" },
            if self.touched { " touched" } else { "" },
            if self.dirty { " dirty" } else { "" },
            self.leaf_count,
        )
    }
}

pub struct Inspector {
    pub enabled: bool,
    pub hovered: Option<FormKey>,
    snapshot_count: u64,
    last_snapshot: Option<Instant>,
    since_last: Option<Duration>,
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector {
    pub fn new() -> Self {
        Self {
            enabled: false,
            hovered: None,
            snapshot_count: 0,
            last_snapshot: None,
            since_last: None,
        }
    }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }

    pub fn set_hovered(&mut self, key: Option<FormKey>) {
        self.hovered = key;
    }

    pub fn snapshot_count(&self) -> u64 {
        self.snapshot_count
    }

    /// Summarize every registered form, sorted by key.
    pub fn snapshot(&mut self, registry: &FormRegistry) -> Vec<FormSummary> {
        self.snapshot_count += 1;
        let now = Instant::now();
        self.since_last = self.last_snapshot.replace(now).map(|prev| now - prev);

        registry
            .entries()
            .into_iter()
            .map(|(key, form)| FormSummary {
                key,
                valid: form.is_valid(),
                touched: form.touched(),
                dirty: form.dirty(),
                leaf_count: form.leaf_count(),
            })
            .collect()
    }

    /// Header line followed by one line per form.
    pub fn overlay_lines(&mut self, registry: &FormRegistry) -> Vec<String> {
        let forms = self.snapshot(registry);
        let mut header = vec![
            format!("snapshot: {}", self.snapshot_count),
            format!("forms: {}", forms.len()),
        ];
        if let Some(dt) = self.since_last {
            header.push(format!("since last: {:.1} ms", dt.as_secs_f64() * 1000.0));
        }

        let mut lines = vec![header.join("  |  ")];
        lines.extend(forms.iter().map(|f| f.line(self.hovered.as_ref() == Some(&f.key))));
        lines
    }

    /// Log the overlay through `log::info!`. Does nothing while disabled.
    pub fn log_snapshot(&mut self, registry: &FormRegistry) {
        if !self.enabled {
            return;
        }
        for line in self.overlay_lines(registry) {
            log::info!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reform_core::{CreateOptions, Schema, Validator};

    fn registry() -> FormRegistry {
        let registry = FormRegistry::new();
        let required = Validator::rule("required", |v| !v.is_empty_value());
        registry.create_and_register_form(
            &Schema::group([("name", Schema::field_with("", [required])), ("age", 3.into())]),
            CreateOptions::new().with_key("b"),
        );
        registry.create_and_register_form(&Schema::field(1), CreateOptions::new().with_key("a"));
        registry
    }

    #[test]
    fn snapshot_summarizes_each_form_in_key_order() {
        let registry = registry();
        registry.get_form("a").unwrap().patch_value(2);
        registry.get_form("b").unwrap().mark_as_touched();

        let mut inspector = Inspector::new();
        let forms = inspector.snapshot(&registry);
        assert_eq!(
            forms,
            vec![
                FormSummary {
                    key: "a".into(),
                    valid: true,
                    touched: false,
                    dirty: true,
                    leaf_count: 1,
                },
                FormSummary {
                    key: "b".into(),
                    valid: false,
                    touched: true,
                    dirty: false,
                    leaf_count: 2,
                },
            ]
        );
        assert_eq!(inspector.snapshot_count(), 1);
    }

    #[test]
    fn overlay_marks_hovered_form() {
        let registry = registry();
        let mut inspector = Inspector::new();
        inspector.set_hovered(Some("b".into()));

        let first = inspector.overlay_lines(&registry);
        assert_eq!(first.len(), 3);
        assert!(first[0].starts_with("snapshot: 1  |  forms: 2"));
        assert!(!first[0].contains("since last"));
        assert!(first[2].starts_with("> b"));
        assert!(first[2].contains("INVALID"));

        let second = inspector.overlay_lines(&registry);
        assert!(second[0].contains("since last"));
    }

    #[test]
    fn disabled_inspector_takes_no_snapshots() {
        let registry = registry();
        let mut inspector = Inspector::new();
        inspector.log_snapshot(&registry);
        assert_eq!(inspector.snapshot_count(), 0);

        inspector.toggle();
        inspector.log_snapshot(&registry);
        assert_eq!(inspector.snapshot_count(), 1);
    }
}
