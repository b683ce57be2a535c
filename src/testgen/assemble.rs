/// Rebuild a test file from its header, the functions kept as they were and
/// the repaired ones, which go last.
///
/// Functions are separated by one blank line, groups by two. Empty groups
/// contribute nothing, so no run of blank lines is left behind. The result
/// always ends with a single newline.
pub fn assemble(header: &str, kept: &[String], repaired: &[String]) -> String {
    let group = |blocks: &[String]| -> String {
        blocks
            .iter()
            .map(|b| tidy(b))
            .filter(|b| !b.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let sections: Vec<String> = [header.trim_end().to_string(), group(kept), group(repaired)]
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect();

    let mut out = sections.join("\n\n\n");
    out.push('\n');
    out
}

/// Drop blank lines around a block without touching its first line's indent.
fn tidy(block: &str) -> &str {
    let block = block.trim_end();
    let first = block
        .find(|c: char| !c.is_whitespace())
        .unwrap_or(block.len());
    let line_start = block[..first].rfind('\n').map_or(0, |i| i + 1);
    &block[line_start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_kept_then_repaired() {
        let out = assemble(
            "import math\n\n\n",
            &["def test_a():\n    pass".into(), "def test_b():\n    pass".into()],
            &["def test_c():\n    assert True".into()],
        );

        assert_eq!(
            out,
            "import math\n\n\ndef test_a():\n    pass\n\ndef test_b():\n    pass\n\n\ndef test_c():\n    assert True\n"
        );
    }

    #[test]
    fn no_dangling_separators() {
        let out = assemble("import math", &[], &["def test_c(): pass".into()]);
        assert_eq!(out, "import math\n\n\ndef test_c(): pass\n");

        let out = assemble("", &["def test_a(): pass".into()], &[]);
        assert_eq!(out, "def test_a(): pass\n");
    }

    #[test]
    fn leading_blank_lines_of_spans_are_dropped() {
        let out = assemble(
            "import math",
            &["\n\n# comment\ndef test_a():\n    pass\n".into()],
            &[],
        );
        assert_eq!(out, "import math\n\n\n# comment\ndef test_a():\n    pass\n");
    }

    #[test]
    fn tidy_keeps_indentation_of_first_line() {
        assert_eq!(tidy("\n  \n    x = 1\n\n"), "    x = 1");
        assert_eq!(tidy(" \n"), "");
    }
}
