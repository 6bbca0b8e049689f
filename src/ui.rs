use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap},
};
use serde_json::Value;

use crate::domain::TVConfig;
use crate::fetcher::Record;
use crate::model::{ColumnView, PagerView, UIData};

pub const COLUMN_WIDTH_MARGIN: usize = 2;
pub const CMDLINE_HEIGH: u16 = 1;
const NULL_CELL: &str = "∅";

/// Text shown for one field of a record. Missing fields render as an empty cell.
pub fn cell_text(record: &Record, key: &str) -> String {
    match record.get(key) {
        None => String::new(),
        Some(Value::Null) => NULL_CELL.to_string(),
        Some(Value::String(s)) => s.replace("\r\n", " ↵ ").replace('\n', " ↵ "),
        Some(other) => other.to_string(),
    }
}

#[derive(Debug)]
pub struct TableUI {
    endpoint: String,
}

impl TableUI {
    pub fn new(config: &TVConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
        }
    }

    pub fn draw(&self, uidata: &UIData, frame: &mut Frame) {
        let title = Line::from(format!(" {} ", uidata.title).bold());
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(Line::from(format!(" {} ", self.endpoint).dim()).right_aligned())
            .border_set(border::THICK);
        let inner = block.inner(frame.area());
        frame.render_widget(block, frame.area());

        let filter_height = if uidata.filter.is_some() { 1 } else { 0 };
        let pager_height = if uidata.pager.is_some() { 1 } else { 0 };
        let [filter_area, table_area, pager_area, status_area] = Layout::vertical([
            Constraint::Length(filter_height),
            Constraint::Min(1),
            Constraint::Length(pager_height),
            Constraint::Length(CMDLINE_HEIGH),
        ])
        .areas(inner);

        if let Some(filter) = &uidata.filter {
            let line = Line::from(vec![
                " title: ".into(),
                format!("[{}]", filter.title).yellow(),
                "  body: ".into(),
                format!("[{}]", filter.body).yellow(),
                "  <t>/<b> edit  <a> apply".dim(),
            ]);
            frame.render_widget(Paragraph::new(line), filter_area);
        }

        match &uidata.record {
            Some(fields) => self.draw_record(fields, uidata.record_line, frame, table_area),
            None => self.draw_table(uidata, frame, table_area),
        }

        if let Some(pager) = &uidata.pager {
            frame.render_widget(Paragraph::new(pager_line(pager)).centered(), pager_area);
        }

        self.draw_statusline(uidata, frame, status_area);

        if uidata.show_column_panel {
            self.draw_column_panel(uidata, frame, inner);
        }
        if uidata.show_popup {
            let area = popup_area(inner, 60, 80);
            frame.render_widget(Clear, area);
            frame.render_widget(
                Paragraph::new(uidata.popup_message.as_str())
                    .wrap(Wrap { trim: false })
                    .block(Block::bordered().title(" Help ".bold())),
                area,
            );
        }
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.table.is_empty() {
            let message = if uidata.loading { "Loading ..." } else { "No data" };
            frame.render_widget(Paragraph::new(message.dim()).centered(), area);
            return;
        }

        let header = Row::new(uidata.table.iter().map(header_cell)).underlined();
        let rows = (0..uidata.nrows).map(|ridx| {
            Row::new(
                uidata
                    .table
                    .iter()
                    .map(|c| Cell::from(c.data.get(ridx).cloned().unwrap_or_default())),
            )
        });
        let widths = uidata.table.iter().map(column_constraint);

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .row_highlight_style(Style::new().reversed())
            .cell_highlight_style(Style::new().bold().yellow());
        let mut state = TableState::default()
            .with_selected(Some(uidata.selected_row))
            .with_selected_column(Some(uidata.selected_column));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_record(&self, fields: &[(String, String)], line: usize, frame: &mut Frame, area: Rect) {
        let key_width = fields.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
        let rows = fields
            .iter()
            .map(|(k, v)| Row::new(vec![Cell::from(k.clone()).bold(), Cell::from(v.clone())]));
        let table = Table::new(
            rows,
            [
                Constraint::Length(u16::try_from(key_width + 1).unwrap_or(u16::MAX)),
                Constraint::Fill(1),
            ],
        )
        .row_highlight_style(Style::new().reversed());
        let mut state = TableState::default().with_selected(Some(line));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_column_panel(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let area = popup_area(area, 40, 70);
        let items = uidata.column_entries.iter().map(|entry| {
            let mark = if entry.visible { "[x] " } else { "[ ] " };
            ListItem::new(format!("{mark}{}", entry.label))
        });
        let list = List::new(items)
            .block(
                Block::bordered()
                    .title(" Columns ".bold())
                    .title_bottom(Line::from(" <Space> show/hide  <J>/<K> move ".dim())),
            )
            .highlight_style(Style::new().reversed());
        let mut state = ListState::default().with_selected(Some(uidata.column_cursor));
        frame.render_widget(Clear, area);
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let prompt = uidata.cmd_mode.map(|m| m.prompt()).unwrap_or(":");
            let line = Line::from(vec![prompt.blue().bold(), uidata.cmdinput.input.clone().into()]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + (prompt.chars().count() + uidata.cmdinput.curser_pos) as u16;
            frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
        } else {
            let mut spans = Vec::new();
            if uidata.loading {
                spans.push(" ⏳ ".yellow());
            }
            spans.push(Span::from(uidata.status_message.clone()));
            spans.push("  <?> help  <q> quit".dim());
            frame.render_widget(Paragraph::new(Line::from(spans)), area);
        }
    }
}

// Rows fetched after a sort are shown with a dimmed indicator.
fn header_line(column: &ColumnView) -> Line<'static> {
    let mut spans = vec![column.name.clone().bold()];
    if let Some(indicator) = column.sort_indicator {
        let indicator = format!(" {indicator}");
        spans.push(if column.sort_applied {
            indicator.bold()
        } else {
            indicator.dark_gray()
        });
    }
    Line::from(spans)
}

fn header_cell(column: &ColumnView) -> Cell<'static> {
    Cell::from(header_line(column))
}

fn column_constraint(column: &ColumnView) -> Constraint {
    Constraint::Length(u16::try_from(column.width).unwrap_or(u16::MAX))
}

fn pager_line(pager: &PagerView) -> Line<'static> {
    let button = |label: &'static str, enabled: bool| {
        if enabled { label.bold() } else { label.dark_gray() }
    };
    let mut spans = vec![
        button("« ", pager.first_enabled),
        button("‹ ", pager.previous_enabled),
    ];
    for page in &pager.window {
        let label = format!(" {page} ");
        if *page == pager.current_page {
            spans.push(label.reversed());
        } else {
            spans.push(label.into());
        }
    }
    spans.push(button(" ›", pager.next_enabled));
    spans.push(button(" »", pager.last_enabled));
    spans.push(format!("   page {}/{}", pager.current_page, pager.total_pages).dim());
    Line::from(spans)
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let width = (area.width as u32 * percent_x as u32 / 100) as u16;
    let height = (area.height as u32 * percent_y as u32 / 100) as u16;
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
