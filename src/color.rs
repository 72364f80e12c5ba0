// ============================================================================
// CSS-style color strings — `rgb(r, g, b)` parse / format
// ============================================================================
//
// The shell persists its current/previous colors in this textual form, and
// the color-picker tool reports sampled pixels the same way. Alpha is never
// part of the string: sampled pixels are treated as opaque.

/// Format an opaque color as `rgb(r, g, b)`.
pub fn format_rgb(r: u8, g: u8, b: u8) -> String {
    format!("rgb({}, {}, {})", r, g, b)
}

/// Parse an `rgb(r, g, b)` string. Whitespace around the components is
/// tolerated; anything else (missing parens, wrong component count,
/// out-of-range values) yields `None`.
pub fn parse_rgb(s: &str) -> Option<(u8, u8, u8)> {
    let body = s
        .trim()
        .strip_prefix("rgb(")
        .and_then(|rest| rest.strip_suffix(')'))?;

    let mut channels = body.split(',').map(|part| part.trim().parse::<u8>());
    let r = channels.next()?.ok()?;
    let g = channels.next()?.ok()?;
    let b = channels.next()?.ok()?;
    if channels.next().is_some() {
        return None;
    }
    Some((r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_matches_css_shape() {
        assert_eq!(format_rgb(10, 20, 30), "rgb(10, 20, 30)");
        assert_eq!(format_rgb(0, 0, 0), "rgb(0, 0, 0)");
    }

    #[test]
    fn parse_round_trips_format() {
        for &(r, g, b) in &[(0u8, 0u8, 0u8), (10, 20, 30), (255, 255, 255)] {
            assert_eq!(parse_rgb(&format_rgb(r, g, b)), Some((r, g, b)));
        }
    }

    #[test]
    fn parse_tolerates_spacing() {
        assert_eq!(parse_rgb("rgb(1,2,3)"), Some((1, 2, 3)));
        assert_eq!(parse_rgb("  rgb( 1 , 2 , 3 )  "), Some((1, 2, 3)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_rgb(""), None);
        assert_eq!(parse_rgb("rgb(1, 2)"), None);
        assert_eq!(parse_rgb("rgb(1, 2, 3, 4)"), None);
        assert_eq!(parse_rgb("rgb(1, 2, 300)"), None);
        assert_eq!(parse_rgb("rgba(1, 2, 3)"), None);
        assert_eq!(parse_rgb("#0a141e"), None);
    }
}
