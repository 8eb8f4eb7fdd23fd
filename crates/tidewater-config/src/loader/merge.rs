//! Section merge helpers for layered configuration.

use crate::SectionMap;

/// Merge overlay options into the base, last writer wins per option.
///
/// `provenance` receives `label` for every option the overlay sets.
pub(crate) fn merge_sections(
    base: &mut SectionMap,
    provenance: &mut SectionMap,
    overlay: SectionMap,
    label: &str,
) {
    for (section, options) in overlay {
        let base_options = base.entry(section.clone()).or_default();
        let sources = provenance.entry(section).or_default();
        for (option, value) in options {
            sources.insert(option.clone(), label.to_string());
            base_options.insert(option, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::merge_sections;
    use crate::SectionMap;
    use pretty_assertions::assert_eq;

    fn layer(section: &str, option: &str, value: &str) -> SectionMap {
        let mut map = SectionMap::new();
        map.entry(section.to_string())
            .or_default()
            .insert(option.to_string(), value.to_string());
        map
    }

    #[test]
    fn later_layer_wins_and_records_source() {
        let mut base = SectionMap::new();
        let mut provenance = SectionMap::new();
        merge_sections(
            &mut base,
            &mut provenance,
            layer("ocean", "grid_type", "uniform"),
            "defaults",
        );
        merge_sections(
            &mut base,
            &mut provenance,
            layer("ocean", "grid_type", "z-level"),
            "task",
        );
        assert_eq!(base["ocean"]["grid_type"], "z-level");
        assert_eq!(provenance["ocean"]["grid_type"], "task");
    }

    #[test]
    fn empty_sections_are_kept() {
        let mut base = SectionMap::new();
        let mut provenance = SectionMap::new();
        let mut overlay = SectionMap::new();
        overlay.insert("empty".to_string(), Default::default());
        merge_sections(&mut base, &mut provenance, overlay, "defaults");
        assert!(base.contains_key("empty"));
    }
}
