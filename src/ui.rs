use crate::metrics::EntityMetric;
use crate::report::PlanReport;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::cmp::Ordering;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Metrics,
    Plan,
    Projection,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Metrics => Page::Plan,
            Page::Plan => Page::Projection,
            Page::Projection => Page::Metrics,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Metrics => Page::Projection,
            Page::Plan => Page::Metrics,
            Page::Projection => Page::Plan,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Metrics => "Metrics",
            Page::Plan => "Plan",
            Page::Projection => "Projection",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Entity,
    Volatility,
    Growth,
    Roi,
}

impl SortKey {
    pub fn next(&self) -> Self {
        match self {
            SortKey::Entity => SortKey::Volatility,
            SortKey::Volatility => SortKey::Growth,
            SortKey::Growth => SortKey::Roi,
            SortKey::Roi => SortKey::Entity,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SortKey::Entity => "entity",
            SortKey::Volatility => "volatility",
            SortKey::Growth => "growth",
            SortKey::Roi => "ROI",
        }
    }
}

pub struct App {
    pub report: PlanReport,
    pub rows: Vec<(String, EntityMetric)>,
    pub state: TableState,
    pub plan_state: TableState,
    pub current_page: Page,
    pub sort_key: SortKey,
    pub show_detail: bool,
}

impl App {
    pub fn new(report: PlanReport) -> Self {
        let rows: Vec<(String, EntityMetric)> = report
            .metrics
            .iter()
            .map(|(entity, m)| (entity.to_string(), *m))
            .collect();

        let mut state = TableState::default();
        if !rows.is_empty() {
            state.select(Some(0));
        }

        let mut plan_state = TableState::default();
        if report.plan().is_some_and(|p| !p.is_empty()) {
            plan_state.select(Some(0));
        }

        Self {
            report,
            rows,
            state,
            plan_state,
            current_page: Page::Metrics,
            sort_key: SortKey::Entity,
            show_detail: false,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_entity(&self) -> Option<&(String, EntityMetric)> {
        self.state.selected().and_then(|i| self.rows.get(i))
    }

    /// Cycle the metrics ordering; numeric keys sort descending.
    pub fn cycle_sort(&mut self) {
        self.sort_key = self.sort_key.next();

        let key = self.sort_key;
        self.rows.sort_by(|a, b| {
            let by = |m: &EntityMetric| match key {
                SortKey::Entity => 0.0,
                SortKey::Volatility => m.volatility,
                SortKey::Growth => m.mean_growth_rate,
                SortKey::Roi => m.roi,
            };
            match key {
                SortKey::Entity => a.0.cmp(&b.0),
                _ => by(&b.1).partial_cmp(&by(&a.1)).unwrap_or(Ordering::Equal),
            }
        });

        if !self.rows.is_empty() {
            self.state.select(Some(0));
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    /// Table cursor of the current page and its row count.
    fn cursor(&mut self) -> Option<(&mut TableState, usize)> {
        match self.current_page {
            Page::Metrics => Some((&mut self.state, self.rows.len())),
            Page::Plan => {
                let len = self.report.plan().map(|p| p.len()).unwrap_or(0);
                Some((&mut self.plan_state, len))
            }
            Page::Projection => None,
        }
    }

    pub fn next(&mut self) {
        let Some((state, len)) = self.cursor() else {
            return;
        };
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let Some((state, len)) = self.cursor() else {
            return;
        };
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let Some((state, len)) = self.cursor() else {
            return;
        };
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) => (i + 20).min(len - 1),
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let Some((state, len)) = self.cursor() else {
            return;
        };
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) => i.saturating_sub(20),
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn first(&mut self) {
        if let Some((state, len)) = self.cursor() {
            if len > 0 {
                state.select(Some(0));
            }
        }
    }

    pub fn last(&mut self) {
        if let Some((state, len)) = self.cursor() {
            if len > 0 {
                state.select(Some(len - 1));
            }
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('s') => app.cycle_sort(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.first(),
                KeyCode::End => app.last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Metrics {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_metrics(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Metrics => render_metrics(f, chunks[1], app),
            Page::Plan => render_plan(f, chunks[1], app),
            Page::Projection => render_projection(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn header_style() -> Style {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Metrics, Page::Plan, Page::Projection];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    let selected = app.report.plan().map(|p| p.len()).unwrap_or(0);
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Universe: {}", app.report.metrics.len()),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Selected: {}", selected),
        Style::default().fg(if selected > 0 { Color::Green } else { Color::Red }),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_metrics(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Entity", "Volatility", "Mean Growth %", "ROI %", "In Plan"]
        .iter()
        .map(|h| Cell::from(*h).style(header_style()));
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let plan = app.report.plan();
    let rows = app.rows.iter().map(|(entity, m)| {
        let roi_color = if m.roi >= 0.0 { Color::Green } else { Color::Red };
        let weight = plan.and_then(|p| p.get(entity));

        Row::new(vec![
            Cell::from(truncate(entity, 24)),
            Cell::from(format!("{:.2}", m.volatility)),
            Cell::from(format!("{:.3}", m.mean_growth_rate)),
            Cell::from(format!("{:.2}", m.roi)).style(Style::default().fg(roi_color)),
            Cell::from(weight.map(|w| format!("{:.1}%", w * 100.0)).unwrap_or_default())
                .style(Style::default().fg(Color::Cyan)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(26),
            Constraint::Length(12),
            Constraint::Length(15),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Return / Risk (sorted by {}) ", app.sort_key.label())),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_plan(f: &mut Frame, area: Rect, app: &mut App) {
    let criteria = *app.report.outcome.criteria();
    let title = format!(
        " Allocation (ROI > {:.2}%, volatility < {:.2}) ",
        criteria.roi_threshold, criteria.volatility_threshold
    );

    let Some(plan) = app.report.plan() else {
        let empty = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                "  No entity passed both thresholds - nothing to allocate.",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
        ])
        .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(empty, area);
        return;
    };

    let header = Row::new(
        ["Entity", "Weight", "ROI %", "Volatility"]
            .iter()
            .map(|h| Cell::from(*h).style(header_style())),
    )
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows: Vec<Row> = plan
        .ranked()
        .into_iter()
        .map(|(entity, weight)| {
            let (roi, vol) = app
                .report
                .metrics
                .get(&entity)
                .map(|m| (m.roi, m.volatility))
                .unwrap_or_default();
            Row::new(vec![
                Cell::from(truncate(&entity, 24)),
                Cell::from(format!("{:.2}%", weight * 100.0)).style(Style::default().fg(Color::Cyan)),
                Cell::from(format!("{:.2}", roi)),
                Cell::from(format!("{:.2}", vol)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(26),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.plan_state);
}

fn render_projection(f: &mut Frame, area: Rect, app: &App) {
    let Some(projection) = &app.report.projection else {
        let empty = Paragraph::new("  No projection: the selection was empty.")
            .block(Block::default().borders(Borders::ALL).title(" Projection "));
        f.render_widget(empty, area);
        return;
    };

    let header = Row::new(
        ["Horizon", "Contributed", "Future Value", "Gain"]
            .iter()
            .map(|h| Cell::from(*h).style(header_style())),
    )
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows = projection.values.iter().map(|v| {
        Row::new(vec![
            Cell::from(format!("{} year", v.years)),
            Cell::from(format!("{:.2}", v.total_contributed)),
            Cell::from(format!("{:.2}", v.future_value)).style(Style::default().fg(Color::Green)),
            Cell::from(format!("{:.2}", v.gain)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(18),
            Constraint::Length(20),
            Constraint::Length(20),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(
                " {:.2}/period at {:.2}% a year ",
                projection.contribution,
                projection.annual_rate * 100.0
            )),
    );

    f.render_widget(table, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let Some((entity, m)) = app.selected_entity() else {
        let no_selection = Paragraph::new("No entity selected").block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(" Entity Details "),
        );
        f.render_widget(no_selection, area);
        return;
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let criteria = app.report.outcome.criteria();
    let weight = app.report.plan().and_then(|p| p.get(entity));
    let is_peer = app.report.comparison.peer_entities.contains(entity);

    let content = vec![
        Line::from(""),
        Line::from(vec![Span::styled("  Entity: ", label), Span::raw(entity.clone())]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Volatility: ", label),
            Span::raw(format!("{:.2}", m.volatility)),
            Span::styled(
                if m.volatility < criteria.volatility_threshold { "  (below median)" } else { "  (at/above median)" },
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(vec![
            Span::styled("  ROI: ", label),
            Span::raw(format!("{:.2}%", m.roi)),
            Span::styled(
                if m.roi > criteria.roi_threshold { "  (above median)" } else { "  (at/below median)" },
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(vec![
            Span::styled("  Mean growth: ", label),
            Span::raw(format!("{:.3}%", m.mean_growth_rate)),
        ]),
        Line::from(vec![
            Span::styled("  Observations: ", label),
            Span::raw(m.observations.to_string()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Plan weight: ", label),
            Span::styled(
                weight.map(|w| format!("{:.2}%", w * 100.0)).unwrap_or_else(|| "-".to_string()),
                Style::default().fg(Color::Green),
            ),
        ]),
        Line::from(vec![
            Span::styled("  Top-growth peer: ", label),
            Span::raw(if is_peer { "yes" } else { "no" }),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "  Press Enter to close",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    let detail_panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Entity Details "),
    );

    f.render_widget(detail_panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let (state, len) = match app.current_page {
        Page::Plan => (&app.plan_state, app.report.plan().map(|p| p.len()).unwrap_or(0)),
        _ => (&app.state, app.rows.len()),
    };
    let selected = state.selected().map(|i| i + 1).unwrap_or(0);

    let status_spans = vec![
        Span::styled(
            format!(" Row: {}/{} ", selected, len),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | "),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" Details | "),
        Span::styled("s", Style::default().fg(Color::Yellow)),
        Span::raw(" Sort | "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Page | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlanConfig;
    use crate::loader::load_from_reader;
    use crate::report::run_pipeline;

    fn app() -> App {
        let csv = "Date,A,B,C,D\n2024-01-01,100,100,100,100\n2024-01-02,101,140,95,102\n2024-01-03,102,60,90,103\n2024-01-04,103,150,85,105\n";
        let loaded = load_from_reader(csv.as_bytes()).unwrap();
        App::new(run_pipeline(&loaded.table, &PlanConfig::default()).unwrap())
    }

    #[test]
    fn test_page_cycle() {
        assert_eq!(Page::Metrics.next(), Page::Plan);
        assert_eq!(Page::Projection.next(), Page::Metrics);
        assert_eq!(Page::Metrics.previous(), Page::Projection);
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = app();
        assert_eq!(app.state.selected(), Some(0));

        app.previous();
        assert_eq!(app.state.selected(), Some(3));
        app.next();
        assert_eq!(app.state.selected(), Some(0));

        app.page_down();
        assert_eq!(app.state.selected(), Some(3));
        app.page_up();
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_navigation_follows_current_page() {
        // BRAVO and DELTA pass both thresholds
        let csv = "\
Date,ALPHA,BRAVO,CHARLIE,DELTA,ECHO,FOXTROT,GOLF,HOTEL
2024-01-01,100,100,100,100,100,100,100,100
2024-01-02,101,102,,104,130,60,95,140
2024-01-03,102,103,101,105,70,120,90,60
2024-01-04,103,104,102,106,140,50,85,150
";
        let loaded = load_from_reader(csv.as_bytes()).unwrap();
        let mut app = App::new(run_pipeline(&loaded.table, &PlanConfig::default()).unwrap());
        assert_eq!(app.report.plan().map(|p| p.len()), Some(2));
        assert_eq!(app.plan_state.selected(), Some(0));

        app.next_page();
        assert_eq!(app.current_page, Page::Plan);
        app.next();
        assert_eq!(app.plan_state.selected(), Some(1));
        assert_eq!(app.state.selected(), Some(0));

        app.next();
        assert_eq!(app.plan_state.selected(), Some(0));
        app.last();
        assert_eq!(app.plan_state.selected(), Some(1));
        app.first();
        assert_eq!(app.plan_state.selected(), Some(0));

        // Projection has no cursor
        app.next_page();
        app.next();
        app.page_down();
        assert_eq!(app.plan_state.selected(), Some(0));
        assert_eq!(app.state.selected(), Some(0));

        app.next_page();
        app.last();
        assert_eq!(app.state.selected(), Some(7));
    }

    #[test]
    fn test_empty_plan_has_no_cursor() {
        let csv = "Date,A,B,C\n2024-01-01,10,20,30\n2024-01-02,11,21,31\n2024-01-03,10,20,30\n";
        let loaded = load_from_reader(csv.as_bytes()).unwrap();
        let mut app = App::new(run_pipeline(&loaded.table, &PlanConfig::default()).unwrap());

        app.next_page();
        app.next();
        app.last();
        assert_eq!(app.plan_state.selected(), None);
    }

    #[test]
    fn test_cycle_sort_orders_rows() {
        let mut app = app();
        assert_eq!(app.rows[0].0, "A");

        app.cycle_sort(); // volatility
        assert_eq!(app.sort_key, SortKey::Volatility);
        assert_eq!(app.rows[0].0, "B");

        app.cycle_sort(); // growth
        app.cycle_sort(); // roi
        assert_eq!(app.rows[0].0, "B");
        assert_eq!(app.rows[3].0, "C");

        app.cycle_sort(); // back to entity
        let names: Vec<&str> = app.rows.iter().map(|(e, _)| e.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("HDFCBANK", 24), "HDFCBANK");
        assert_eq!(truncate("BAJAJ-AUTO LIMITED", 10), "BAJAJ-A...");
    }
}
