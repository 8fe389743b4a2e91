//! Console formatting helpers shared by the MongoDB scripts.
use super::models::Breadcrumb;

/// formats a duration given in milliseconds with a unit that keeps the number readable
pub fn format_time(milliseconds: f64) -> String {
    if milliseconds < 1.0 {
        format!("{:.2} µs", milliseconds * 1000.0)
    } else if milliseconds < 1000.0 {
        format!("{:.2} ms", milliseconds)
    } else {
        format!("{:.2} s", milliseconds / 1000.0)
    }
}

/// formats an integer with `,` thousands separators
pub fn format_number(number: i64) -> String {
    let digits = number.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if number < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `part` as a percentage of `total`, `0` when `total` is zero
pub fn percentage(part: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        part / total * 100.0
    }
}

/// renders a breadcrumb trail as `L1: a → L2: b`
pub fn format_breadcrumbs(breadcrumbs: &[Breadcrumb]) -> String {
    if breadcrumbs.is_empty() {
        return "N/A".to_string();
    }
    breadcrumbs
        .iter()
        .map(|b| format!("L{}: {}", b.level, b.name))
        .collect::<Vec<_>>()
        .join(" → ")
}

/// shortens `s` to `max` characters, marking the cut with `...`
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max).collect();
        cut.push_str("...");
        cut
    }
}

/// prints a section header framed by `=` rules
pub fn print_section(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!(" {}", title);
    println!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_units() {
        assert_eq!(format_time(0.5), "500.00 µs");
        assert_eq!(format_time(12.346), "12.35 ms");
        assert_eq!(format_time(2500.0), "2.50 s");
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(3_990_000), "3,990,000");
        assert_eq!(format_number(-1_234_567), "-1,234,567");
    }

    #[test]
    fn percentage_of_nothing_is_zero() {
        assert_eq!(percentage(5.0, 0.0), 0.0);
        assert_eq!(percentage(1.0, 4.0), 25.0);
    }

    #[test]
    fn breadcrumb_trail() {
        let crumbs = vec![
            Breadcrumb { level: 1, name: "Tools".into() },
            Breadcrumb { level: 2, name: "Pneumatic".into() },
        ];
        assert_eq!(format_breadcrumbs(&crumbs), "L1: Tools → L2: Pneumatic");
        assert_eq!(format_breadcrumbs(&[]), "N/A");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate("Строительство", 5), "Строи...");
        assert_eq!(truncate("short", 10), "short");
    }
}
