/// Lowercase `value` and replace spaces and underscores with hyphens.
pub fn slug(value: &str) -> String {
    value.replace([' ', '_'], "-").to_lowercase()
}

/// Inverse used when comparing titles that were submitted in slug form.
pub fn hyphens_to_spaces(value: &str) -> String {
    value.replace('-', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_replaces_separators() {
        assert_eq!(slug("Tic Tac_Toe"), "tic-tac-toe");
        assert_eq!(slug("ludo"), "ludo");
        assert_eq!(slug(""), "");
    }

    #[test]
    fn hyphens_become_spaces() {
        assert_eq!(hyphens_to_spaces("use-strong-passwords"), "use strong passwords");
    }
}
