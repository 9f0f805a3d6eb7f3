use crate::types::StructLayout;
use colored::Colorize;
use comfy_table::{Cell, Color, Table, presets::UTF8_FULL_CONDENSED};

/// Human-readable padding report: one member table per struct, padding rows
/// highlighted, followed by a description of every hole.
pub struct TableFormatter {
    no_color: bool,
}

impl TableFormatter {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }

    pub fn format(&self, layouts: &[StructLayout]) -> String {
        layouts.iter().map(|layout| self.format_struct(layout)).collect::<Vec<_>>().join("\n\n")
    }

    fn format_struct(&self, layout: &StructLayout) -> String {
        let mut output = String::new();

        let header = format!(
            "struct {} ({} bytes, {} padding byte{})",
            layout.name,
            layout.size,
            layout.padding_bytes,
            if layout.padding_bytes == 1 { "" } else { "s" }
        );
        output.push_str(&self.paint(&header, |s| s.bold().to_string()));
        output.push('\n');

        if let Some(ref loc) = layout.source_location {
            output.push_str(&format!("  defined at {}\n", loc));
        }
        output.push('\n');

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["Offset", "Size", "Type", "Field"]);

        let mut holes = layout.padding_holes.iter().peekable();
        for member in &layout.members {
            while let Some(hole) = holes.next_if(|hole| hole.offset < member.offset) {
                table.add_row(self.padding_row(hole.offset, hole.size));
            }
            table.add_row(vec![
                Cell::new(member.offset),
                Cell::new(member.size),
                Cell::new(&member.type_name),
                Cell::new(&member.name),
            ]);
        }
        for hole in holes {
            table.add_row(self.padding_row(hole.offset, hole.size));
        }
        output.push_str(&table.to_string());
        output.push('\n');

        if layout.padding_holes.is_empty() {
            let note = if layout.has_padding {
                "No gaps of its own; a nested member type is padded"
            } else {
                "No padding"
            };
            output.push_str(&format!("\n{}\n", note));
        } else {
            output.push('\n');
            for hole in &layout.padding_holes {
                let line = format!("  - {} ({} bytes)", hole, hole.size);
                output.push_str(&self.paint(&line, |s| s.yellow().to_string()));
                output.push('\n');
            }
        }

        output
    }

    fn padding_row(&self, offset: u64, size: u64) -> Vec<Cell> {
        let cells = vec![
            Cell::new(offset),
            Cell::new(format!("[{} bytes]", size)),
            Cell::new("---"),
            Cell::new("PAD"),
        ];
        if self.no_color { cells } else { cells.into_iter().map(|c| c.fg(Color::Yellow)).collect() }
    }

    fn paint(&self, text: &str, style: impl Fn(&str) -> String) -> String {
        if self.no_color { text.to_string() } else { style(text) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MemberLayout, PaddingHole};

    fn padded() -> StructLayout {
        StructLayout {
            name: "Padded".to_string(),
            size: 8,
            members: vec![
                MemberLayout { name: "a".into(), type_name: "char".into(), offset: 0, size: 1 },
                MemberLayout { name: "b".into(), type_name: "int".into(), offset: 4, size: 4 },
            ],
            has_padding: true,
            padding_bytes: 3,
            padding_holes: vec![PaddingHole {
                offset: 1,
                size: 3,
                after_member: Some("a".into()),
                after_member_offset: 0,
                before_member: Some("b".into()),
            }],
            source_location: None,
        }
    }

    #[test]
    fn report_lists_padding_row_and_description() {
        let out = TableFormatter::new(true).format(&[padded()]);
        assert!(out.starts_with("struct Padded (8 bytes, 3 padding bytes)"));
        assert!(out.contains("PAD"));
        assert!(out.contains("[3 bytes]"));
        assert!(out.contains("Padding between 'a', which spans 0:1, and 'b', which starts at 4"));
    }

    #[test]
    fn dense_struct_says_so() {
        let mut layout = padded();
        layout.padding_holes.clear();
        layout.padding_bytes = 0;
        layout.has_padding = false;

        let out = TableFormatter::new(true).format(&[layout]);
        assert!(out.contains("No padding"));
        assert!(!out.contains("PAD"));
    }

    #[test]
    fn structs_are_separated() {
        let out = TableFormatter::new(true).format(&[padded(), padded()]);
        assert_eq!(out.matches("struct Padded").count(), 2);
    }
}
