use std::io::{self, Write};

use colored::Colorize;

use crate::types::{Status, TargetRow};

/// Address column width: the longest dotted-quad literal.
const ADDR_WIDTH: usize = "000.000.000.000".len();
/// Status column width, sized from the longest status word.
const STATUS_WIDTH: usize = "awaiting...".len() - 1;

/// In-place terminal table over any byte sink.
///
/// The dashboard tracks how many lines the previous draw wrote and erases
/// exactly that many before redrawing, so a refresh repaints instead of
/// scrolling. Writing through a generic sink keeps the drawn bytes
/// observable in tests.
pub struct Dashboard<W: Write> {
    out: W,
    lines_written: usize,
}

impl<W: Write> Dashboard<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            lines_written: 0,
        }
    }

    /// Lines the previous draw left on screen.
    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Erase the previous table (if any) and draw the current snapshot.
    ///
    /// A draw over `n` rows always writes `1 + 2*n + 1` lines: a header,
    /// a divider plus an entry per row, and the bottom border. Row order
    /// follows the snapshot, which follows submission order.
    pub fn draw(&mut self, snapshot: &[TargetRow]) -> io::Result<()> {
        self.erase()?;
        writeln!(self.out, "{}", header())?;
        self.lines_written += 1;
        for (idx, row) in snapshot.iter().enumerate() {
            writeln!(self.out, "{}", divider(idx == 0))?;
            writeln!(self.out, "{}", entry(row))?;
            self.lines_written += 2;
        }
        writeln!(self.out, "{}", bottom())?;
        self.lines_written += 1;
        self.out.flush()
    }

    /// Cursor-up plus erase-line, once per previously written line.
    fn erase(&mut self) -> io::Result<()> {
        for _ in 0..self.lines_written {
            write!(self.out, "\x1b[1A\x1b[2K")?;
        }
        self.lines_written = 0;
        Ok(())
    }
}

fn header() -> String {
    format!(
        " IP ADDRESS      ICMP PING?        {} :: {}",
        "[open ports]".green(),
        "[closed ports]".red()
    )
}

fn bar(width: usize) -> String {
    "━".repeat(width)
}

fn divider(first: bool) -> String {
    let (left, mid, right) = if first {
        ("┏", "┳", "┓")
    } else {
        ("┣", "╋", "┫")
    };
    format!(
        "{}{}{}{}{}",
        left.blue(),
        bar(ADDR_WIDTH).blue(),
        mid.blue(),
        bar(STATUS_WIDTH + 2).blue(),
        right.blue()
    )
}

fn bottom() -> String {
    format!(
        "{}{}{}{}{}",
        "┗".blue(),
        bar(ADDR_WIDTH).blue(),
        "┻".blue(),
        bar(STATUS_WIDTH + 2).blue(),
        "┛".blue()
    )
}

fn entry(row: &TargetRow) -> String {
    let address = clip_address(&row.address);
    let address_pad = " ".repeat(ADDR_WIDTH - address.chars().count());
    let (status, painted) = match row.outcome.status {
        Status::Pending => ("awaiting...", "awaiting...".cyan()),
        Status::Reachable => ("OK", "OK".green()),
        Status::Unreachable => ("TIMED OUT", "TIMED OUT".red()),
    };
    let status_pad = " ".repeat(STATUS_WIDTH + 1 - status.len());
    format!(
        "{bar}{address}{address_pad}{bar}{painted}{status_pad} {bar} ==> {open} :: {closed}",
        bar = "┃".blue(),
        open = fmt_ports(&row.outcome.open).green(),
        closed = fmt_ports(&row.outcome.closed).red(),
    )
}

/// Pad-or-truncate to the fixed address column, marking cut values.
fn clip_address(address: &str) -> String {
    if address.chars().count() <= ADDR_WIDTH {
        return address.to_string();
    }
    let head: String = address.chars().take(ADDR_WIDTH - 3).collect();
    format!("{head}...")
}

fn fmt_ports(ports: &[u16]) -> String {
    if ports.is_empty() {
        return "None".to_string();
    }
    let items: Vec<String> = ports.iter().map(u16::to_string).collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbeOutcome;

    fn row(address: &str, status: Status) -> TargetRow {
        TargetRow {
            name: address.to_string(),
            address: address.to_string(),
            outcome: ProbeOutcome {
                status,
                open: Vec::new(),
                closed: Vec::new(),
            },
        }
    }

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn two_rows_write_six_lines() {
        plain();
        let rows = vec![
            row("10.0.0.1", Status::Pending),
            row("10.0.0.2", Status::Reachable),
        ];
        let mut dash = Dashboard::new(Vec::new());
        dash.draw(&rows).unwrap();
        assert_eq!(dash.lines_written(), 6);

        let text = String::from_utf8(dash.into_inner()).unwrap();
        assert_eq!(text.matches('\n').count(), 6);
    }

    #[test]
    fn redraw_erases_exactly_the_previous_line_count() {
        plain();
        let rows = vec![
            row("10.0.0.1", Status::Pending),
            row("10.0.0.2", Status::Pending),
        ];
        let mut dash = Dashboard::new(Vec::new());
        dash.draw(&rows).unwrap();
        dash.draw(&rows).unwrap();
        assert_eq!(dash.lines_written(), 6);

        let text = String::from_utf8(dash.into_inner()).unwrap();
        assert_eq!(text.matches("\x1b[1A\x1b[2K").count(), 6);
        assert_eq!(text.matches('\n').count(), 12);
    }

    #[test]
    fn statuses_render_their_labels() {
        plain();
        let rows = vec![
            row("10.0.0.1", Status::Pending),
            row("10.0.0.2", Status::Reachable),
            row("10.0.0.3", Status::Unreachable),
        ];
        let mut dash = Dashboard::new(Vec::new());
        dash.draw(&rows).unwrap();
        let text = String::from_utf8(dash.into_inner()).unwrap();
        assert!(text.contains("awaiting..."));
        assert!(text.contains("OK"));
        assert!(text.contains("TIMED OUT"));
    }

    #[test]
    fn long_addresses_are_clipped_with_a_marker() {
        assert_eq!(clip_address("very-long-hostname.example.com"), "very-long-ho...");
        assert_eq!(clip_address("very-long-ho...").chars().count(), ADDR_WIDTH);
        assert_eq!(clip_address("10.0.0.1"), "10.0.0.1");
    }

    #[test]
    fn port_sets_render_as_lists_or_placeholder() {
        assert_eq!(fmt_ports(&[]), "None");
        assert_eq!(fmt_ports(&[22, 443]), "[22, 443]");
    }

    #[test]
    fn classified_ports_show_up_in_the_entry_line() {
        plain();
        let mut target = row("10.0.0.1", Status::Reachable);
        target.outcome.open = vec![80, 443];
        target.outcome.closed = vec![22];
        let mut dash = Dashboard::new(Vec::new());
        dash.draw(&[target]).unwrap();
        let text = String::from_utf8(dash.into_inner()).unwrap();
        assert!(text.contains("==> [80, 443] :: [22]"));
    }

    #[test]
    fn header_and_borders_frame_the_table() {
        plain();
        let mut dash = Dashboard::new(Vec::new());
        dash.draw(&[row("10.0.0.1", Status::Pending)]).unwrap();
        let text = String::from_utf8(dash.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("IP ADDRESS"));
        assert!(lines[1].starts_with('┏') && lines[1].ends_with('┓'));
        assert!(lines[2].starts_with('┃'));
        assert!(lines[3].starts_with('┗') && lines[3].ends_with('┛'));
    }
}
