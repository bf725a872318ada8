use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Clear, Paragraph, Row, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Table, Wrap,
    },
};
use tracing::trace;

use crate::domain::{CMDMode, ViewerConfig};
use crate::model::{Model, SelectorView, UIData};

pub const HEADER_HEIGHT: usize = 1;
pub const QUERY_HEIGHT: usize = 3;
pub const STATS_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const PAGINATION_HEIGHT: usize = 1;
pub const CMDLINE_HEIGH: usize = 1;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const ROW_HEIGHT: usize = 1;

/// Colors of one theme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: Color,
    pub surface: Color,
    pub text: Color,
    pub border: Color,
    pub primary: Color,
    pub secondary: Color,
    pub error: Color,
    pub header_bg: Color,
    pub hover_bg: Color,
}

impl Palette {
    pub const LIGHT: Palette = Palette {
        background: Color::Rgb(0xf5, 0xf5, 0xf5),
        surface: Color::Rgb(0xff, 0xff, 0xff),
        text: Color::Rgb(0x00, 0x00, 0x00),
        border: Color::Rgb(0xdd, 0xdd, 0xdd),
        primary: Color::Rgb(0x4c, 0xaf, 0x50),
        secondary: Color::Rgb(0x21, 0x96, 0xf3),
        error: Color::Rgb(0xf4, 0x43, 0x36),
        header_bg: Color::Rgb(0xe8, 0xe8, 0xe8),
        hover_bg: Color::Rgb(0xf0, 0xf0, 0xf0),
    };

    pub const DARK: Palette = Palette {
        background: Color::Rgb(0x1a, 0x1a, 0x1a),
        surface: Color::Rgb(0x2d, 0x2d, 0x2d),
        text: Color::Rgb(0xff, 0xff, 0xff),
        border: Color::Rgb(0x40, 0x40, 0x40),
        primary: Color::Rgb(0x66, 0xbb, 0x6a),
        secondary: Color::Rgb(0x42, 0xa5, 0xf5),
        error: Color::Rgb(0xef, 0x53, 0x50),
        header_bg: Color::Rgb(0x33, 0x33, 0x33),
        hover_bg: Color::Rgb(0x40, 0x40, 0x40),
    };

    pub fn for_mode(dark_mode: bool) -> Self {
        if dark_mode { Self::DARK } else { Self::LIGHT }
    }
}

pub struct TableUI {
    title: String,
}

impl TableUI {
    pub fn new(_cfg: &ViewerConfig) -> Self {
        Self {
            title: format!(" sqlview {} ", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let palette = Palette::for_mode(uidata.dark_mode);
        let base = Style::default().fg(palette.text).bg(palette.background);
        frame.render_widget(Block::default().style(base), frame.area());

        let [header_area, query_area, stats_area, table_area, pagination_area, cmd_area] =
            Layout::vertical([
                Constraint::Length(HEADER_HEIGHT as u16),
                Constraint::Length(QUERY_HEIGHT as u16),
                Constraint::Length(STATS_HEIGHT as u16),
                Constraint::Fill(1),
                Constraint::Length(PAGINATION_HEIGHT as u16),
                Constraint::Length(CMDLINE_HEIGH as u16),
            ])
            .areas(frame.area());

        self.draw_header(uidata, &palette, frame, header_area);
        self.draw_query(uidata, &palette, frame, query_area);
        self.draw_stats(uidata, &palette, frame, stats_area);
        self.draw_table(uidata, &palette, frame, table_area);
        self.draw_pagination(uidata, &palette, frame, pagination_area);
        self.draw_cmdline(uidata, &palette, frame, cmd_area, query_area);

        if let Some(selector) = &uidata.selector {
            self.draw_selector(selector, &palette, frame);
        }
        if uidata.show_popup {
            self.draw_popup(&uidata.popup_message, &palette, frame);
        }
    }

    fn draw_header(&self, uidata: &UIData, palette: &Palette, frame: &mut Frame, area: Rect) {
        let mode = if uidata.dark_mode { "dark" } else { "light" };
        let view = if uidata.columns_only {
            "columns"
        } else {
            "data"
        };
        let line = Line::from(vec![
            Span::styled(self.title.clone(), Style::default().fg(palette.primary).bold()),
            Span::raw(format!(" view: {view}  theme: {mode}  ")),
            Span::styled("? help", Style::default().fg(palette.secondary)),
        ]);
        frame.render_widget(
            Paragraph::new(line).style(Style::default().bg(palette.header_bg)),
            area,
        );
    }

    fn draw_query(&self, uidata: &UIData, palette: &Palette, frame: &mut Frame, area: Rect) {
        let editing = uidata.active_cmdinput && uidata.cmd_mode == Some(CMDMode::Query);
        let text = if editing {
            uidata.cmdinput.text.clone()
        } else {
            uidata.query.clone()
        };
        let border = if editing {
            palette.primary
        } else {
            palette.border
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(" Query ")
            .style(Style::default().bg(palette.surface));
        frame.render_widget(Paragraph::new(text).block(block), area);
    }

    fn draw_stats(&self, uidata: &UIData, palette: &Palette, frame: &mut Frame, area: Rect) {
        let line = if let Some(running) = uidata.running {
            Line::from(Span::styled(
                format!("Running query ... {:.1}s", running.as_secs_f64()),
                Style::default().fg(palette.secondary),
            ))
        } else if let Some((ok, stats)) = &uidata.stats {
            let color = if *ok { palette.primary } else { palette.error };
            Line::from(Span::styled(stats.clone(), Style::default().fg(color)))
        } else {
            Line::from("")
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_table(&self, uidata: &UIData, palette: &Palette, frame: &mut Frame, area: Rect) {
        if let Some(message) = &uidata.empty_message {
            let color = match &uidata.stats {
                Some((false, _)) => palette.error,
                _ => palette.text,
            };
            let paragraph = Paragraph::new(message.clone())
                .style(Style::default().fg(color))
                .centered()
                .wrap(Wrap { trim: true });
            let [_, middle, _] = Layout::vertical([
                Constraint::Fill(1),
                Constraint::Length(2),
                Constraint::Fill(1),
            ])
            .areas(area);
            frame.render_widget(paragraph, middle);
            return;
        }

        let [table_area, scrollbar_area] =
            Layout::horizontal([Constraint::Fill(1), Constraint::Length(SCROLLBAR_WIDTH as u16)])
                .areas(area);

        let header_style = Style::default()
            .fg(palette.text)
            .bg(palette.header_bg)
            .add_modifier(Modifier::BOLD);
        let header = Row::new(
            uidata
                .table
                .iter()
                .enumerate()
                .map(|(cidx, column)| {
                    let cell = Cell::from(column.name.clone());
                    if cidx == uidata.selected_column {
                        cell.style(Style::default().fg(palette.secondary))
                    } else {
                        cell
                    }
                })
                .collect::<Vec<Cell>>(),
        )
        .style(header_style);

        let nrows = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);
        let rows = (0..nrows).map(|ridx| {
            let selected_row = ridx == uidata.selected_row;
            let cells = uidata
                .table
                .iter()
                .enumerate()
                .map(|(cidx, column)| {
                    let cell = Cell::from(column.data[ridx].clone());
                    if selected_row && cidx == uidata.selected_column {
                        cell.style(
                            Style::default()
                                .fg(palette.surface)
                                .bg(palette.secondary)
                                .add_modifier(Modifier::BOLD),
                        )
                    } else {
                        cell
                    }
                })
                .collect::<Vec<Cell>>();
            let row = Row::new(cells).height(ROW_HEIGHT as u16);
            if selected_row {
                row.style(Style::default().bg(palette.hover_bg))
            } else {
                row.style(Style::default().bg(palette.surface))
            }
        });

        let widths = uidata
            .table
            .iter()
            .map(|c| Constraint::Length(c.width as u16))
            .collect::<Vec<Constraint>>();
        let table = Table::new(rows, widths).header(header).column_spacing(1);
        frame.render_widget(table, table_area);

        let mut scrollbar_state =
            ScrollbarState::new(uidata.list_height.max(nrows)).position(uidata.selected_row);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .style(Style::default().fg(palette.border)),
            scrollbar_area,
            &mut scrollbar_state,
        );
    }

    fn draw_pagination(&self, uidata: &UIData, palette: &Palette, frame: &mut Frame, area: Rect) {
        if uidata.page_info.is_empty() {
            return;
        }
        let mut spans = vec![
            Span::raw(uidata.page_info.clone()),
            Span::raw("  "),
            Span::styled(uidata.page_label.clone(), Style::default().fg(palette.secondary)),
        ];
        if !uidata.filter.is_empty() {
            spans.push(Span::raw("  filter: "));
            spans.push(Span::styled(
                uidata.filter.clone(),
                Style::default().fg(palette.primary),
            ));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_cmdline(
        &self,
        uidata: &UIData,
        palette: &Palette,
        frame: &mut Frame,
        area: Rect,
        query_area: Rect,
    ) {
        let style = Style::default().fg(palette.text).bg(palette.header_bg);
        if !uidata.active_cmdinput {
            frame.render_widget(
                Paragraph::new(uidata.status_message.clone()).style(style),
                area,
            );
            return;
        }
        match uidata.cmd_mode {
            Some(CMDMode::Filter) => {
                let prompt = "Filter: ";
                let line = Line::from(vec![
                    Span::styled(prompt, Style::default().fg(palette.primary).bold()),
                    Span::raw(uidata.cmdinput.text.clone()),
                ]);
                frame.render_widget(Paragraph::new(line).style(style), area);
                let x = area.x + (prompt.len() + uidata.cmdinput.cursor) as u16;
                frame.set_cursor_position(Position::new(
                    x.min(area.right().saturating_sub(1)),
                    area.y,
                ));
            }
            Some(CMDMode::Query) => {
                frame.render_widget(
                    Paragraph::new("Editing query: <Enter> run  <Esc> cancel  <Ctrl-u> clear")
                        .style(style),
                    area,
                );
                // Inside the query box border
                let x = query_area.x + 1 + uidata.cmdinput.cursor as u16;
                frame.set_cursor_position(Position::new(
                    x.min(query_area.right().saturating_sub(2)),
                    query_area.y + 1,
                ));
            }
            None => trace!("Cmd input without mode"),
        }
    }

    fn draw_selector(&self, selector: &SelectorView, palette: &Palette, frame: &mut Frame) {
        let area = popup_area(frame.area(), 70, 60);
        let lines = if selector.items.is_empty() {
            vec![Line::from(Span::styled(
                "Nothing here yet",
                Style::default().fg(palette.border),
            ))]
        } else {
            selector
                .items
                .iter()
                .enumerate()
                .map(|(idx, item)| {
                    if idx == selector.cursor {
                        Line::from(Span::styled(
                            format!("> {item}"),
                            Style::default().fg(palette.surface).bg(palette.secondary),
                        ))
                    } else {
                        Line::from(format!("  {item}"))
                    }
                })
                .collect()
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(selector.title.clone())
            .title_bottom(Line::from(selector.hint.clone()).centered())
            .border_style(Style::default().fg(palette.secondary))
            .style(Style::default().fg(palette.text).bg(palette.surface));
        frame.render_widget(Clear, area);
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn draw_popup(&self, message: &str, palette: &Palette, frame: &mut Frame) {
        let area = popup_area(frame.area(), 60, 80);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Help ")
            .title_bottom(Line::from("<Esc> close").centered())
            .border_style(Style::default().fg(palette.primary))
            .style(Style::default().fg(palette.text).bg(palette.surface));
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(message.to_string())
                .block(block)
                .wrap(Wrap { trim: false }),
            area,
        );
    }
}

/// Centered rect using the given share of the outer area in percent.
fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [_, vertical, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(area);
    let [_, horizontal, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(vertical);
    horizontal
}
