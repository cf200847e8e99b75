use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent};
use ratatui::{
    DefaultTerminal, Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::*,
};
use scraper::Html;
use tracing::{info, warn};

use crate::api::{
    BibleClient, BibleVersion, Book, ChapterContent, ChapterLink, ChapterSummary, SearchHits,
};
use crate::args::Options;
use crate::position::{self, Position};
use crate::verse::{self, RawContent, Verse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Versions,
    Books,
    Chapters,
    Reader,
    Search,
}

pub struct App {
    running: bool,
    client: BibleClient,
    pane: Pane,
    versions: Vec<BibleVersion>,
    version_state: ListState,
    books: Vec<Book>,
    book_state: ListState,
    chapters: Vec<ChapterSummary>,
    chapter_state: ListState,
    chapter: Option<ChapterContent>,
    verses: Vec<Verse>,
    offset: usize,
    search_query: String,
    search_hits: Option<SearchHits>,
    status: Option<String>,
}

impl App {
    pub fn new(options: Options) -> Result<Self> {
        let client = BibleClient::new(options.api_key)?;
        Ok(Self {
            running: false,
            client,
            pane: Pane::Versions,
            versions: Vec::new(),
            version_state: ListState::default(),
            books: Vec::new(),
            book_state: ListState::default(),
            chapters: Vec::new(),
            chapter_state: ListState::default(),
            chapter: None,
            verses: Vec::new(),
            offset: 0,
            search_query: String::new(),
            search_hits: None,
            status: None,
        })
    }

    pub fn run(&mut self, mut terminal: DefaultTerminal) -> Result<()> {
        self.load_versions();
        self.restore_position();
        self.running = true;
        while self.running {
            terminal.draw(|f| {
                self.render(f);
            })?;
            self.handle_crossterm_event()?;
        }
        Ok(())
    }

    // data loading

    fn load_versions(&mut self) {
        match self.client.bibles() {
            Ok(versions) => {
                self.versions = versions;
                if !self.versions.is_empty() {
                    self.version_state.select(Some(0));
                }
            }
            Err(err) => self.report(err, "failed to fetch Bible versions"),
        }
    }

    fn load_books(&mut self) {
        let Some(bible_id) = self.selected_version().map(|v| v.id.clone()) else {
            return;
        };
        self.books.clear();
        self.book_state.select(None);
        self.reset_chapter_state();
        match self.client.books(&bible_id) {
            Ok(books) => {
                self.books = books;
                if !self.books.is_empty() {
                    self.book_state.select(Some(0));
                }
                self.status = None;
            }
            Err(err) => self.report(err, "failed to fetch books"),
        }
    }

    fn load_chapters(&mut self) {
        let Some(bible_id) = self.selected_version().map(|v| v.id.clone()) else {
            return;
        };
        let Some(book_id) = self.selected_book().map(|b| b.id.clone()) else {
            return;
        };
        self.reset_chapter_state();
        match self.client.chapters(&bible_id, &book_id) {
            Ok(chapters) => {
                // intro pseudo-chapters carry no verse content
                self.chapters = chapters.into_iter().filter(|c| c.number != "intro").collect();
                if !self.chapters.is_empty() {
                    self.chapter_state.select(Some(0));
                }
                self.status = None;
            }
            Err(err) => self.report(err, "failed to fetch chapters"),
        }
    }

    fn load_chapter(&mut self) {
        let Some(bible_id) = self.selected_version().map(|v| v.id.clone()) else {
            return;
        };
        let Some(chapter_id) = self.selected_chapter().map(|c| c.id.clone()) else {
            return;
        };
        match self.client.chapter(&bible_id, &chapter_id) {
            Ok(chapter) => {
                self.verses = verse::extract_verses(&chapter.content);
                if self.verses.is_empty() {
                    info!(chapter = %chapter.id, "no verse units recognized, rendering raw content");
                }
                self.chapter = Some(chapter);
                self.offset = 0;
                self.search_hits = None;
                self.status = None;
                self.save_position();
            }
            Err(err) => self.report(err, "failed to fetch chapter"),
        }
    }

    fn reset_chapter_state(&mut self) {
        self.chapters.clear();
        self.chapter_state.select(None);
        self.chapter = None;
        self.verses.clear();
        self.search_hits = None;
        self.offset = 0;
    }

    fn restore_position(&mut self) {
        let Some(saved) = position::load() else { return };
        let Some(vi) = self.versions.iter().position(|v| v.id == saved.bible_id) else {
            return;
        };
        self.version_state.select(Some(vi));
        self.load_books();
        let Some(bi) = self.books.iter().position(|b| b.id == saved.book_id) else {
            return;
        };
        self.book_state.select(Some(bi));
        self.load_chapters();
        let Some(ci) = self.chapters.iter().position(|c| c.id == saved.chapter_id) else {
            return;
        };
        self.chapter_state.select(Some(ci));
        self.load_chapter();
        if self.chapter.is_some() {
            self.pane = Pane::Reader;
        }
    }

    fn save_position(&self) {
        let (Some(version), Some(book), Some(chapter)) = (
            self.selected_version(),
            self.selected_book(),
            self.selected_chapter(),
        ) else {
            return;
        };
        let saved = Position {
            bible_id: version.id.clone(),
            book_id: book.id.clone(),
            chapter_id: chapter.id.clone(),
        };
        if let Err(err) = position::save(&saved) {
            warn!(error = %err, "failed to save reading position");
        }
    }

    fn run_search(&mut self) {
        let query = self.search_query.trim().to_string();
        if query.is_empty() {
            return;
        }
        let Some(bible_id) = self.selected_version().map(|v| v.id.clone()) else {
            self.status = Some("select a Bible version before searching".to_string());
            return;
        };
        match self.client.search(&bible_id, &query) {
            Ok(hits) => {
                self.search_hits = Some(hits);
                self.offset = 0;
                self.status = None;
            }
            Err(err) => {
                self.search_hits = None;
                self.report(err, "search failed");
            }
        }
    }

    fn report(&mut self, err: impl std::fmt::Display, what: &str) {
        warn!(error = %err, "{what}");
        self.status = Some(format!("{what}: {err}"));
    }

    // selection

    fn selected_version(&self) -> Option<&BibleVersion> {
        self.version_state.selected().and_then(|i| self.versions.get(i))
    }

    fn selected_book(&self) -> Option<&Book> {
        self.book_state.selected().and_then(|i| self.books.get(i))
    }

    fn selected_chapter(&self) -> Option<&ChapterSummary> {
        self.chapter_state.selected().and_then(|i| self.chapters.get(i))
    }

    // rendering

    fn render(&mut self, frame: &mut Frame) {
        let chunks = self.get_layout_chunks(frame.area());
        self.render_title(frame, chunks[0]);
        self.render_body(frame, chunks[1]);
        self.render_footer(frame, chunks[2]);
    }

    fn get_layout_chunks(&self, area: Rect) -> Vec<Rect> {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints(
                [
                    Constraint::Length(1),
                    Constraint::Min(1),
                    Constraint::Length(1),
                ]
                .as_ref(),
            )
            .split(area)
            .to_vec()
    }

    fn render_title(&self, frame: &mut Frame, area: Rect) {
        let heading = match self.chapter.as_ref().and_then(|c| c.reference.as_deref()) {
            Some(reference) => format!("bibletui | {reference}"),
            None => "bibletui".to_string(),
        };
        let title = Paragraph::new(heading).style(Style::default().fg(Color::White));
        frame.render_widget(title, area);
    }

    fn render_body(&mut self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(34), Constraint::Min(1)].as_ref())
            .split(area);
        let lists = Layout::default()
            .direction(Direction::Vertical)
            .constraints(
                [
                    Constraint::Ratio(1, 3),
                    Constraint::Ratio(1, 3),
                    Constraint::Ratio(1, 3),
                ]
                .as_ref(),
            )
            .split(columns[0]);

        self.render_versions(frame, lists[0]);
        self.render_books(frame, lists[1]);
        self.render_chapters(frame, lists[2]);

        if self.pane == Pane::Search || self.search_hits.is_some() {
            self.render_search(frame, columns[1]);
        } else {
            self.render_reader(frame, columns[1]);
        }
    }

    fn render_versions(&mut self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .versions
            .iter()
            .map(|v| ListItem::new(format!("{} ({})", v.name, v.abbreviation)))
            .collect();
        let list = List::new(items)
            .block(self.pane_block("Version", Pane::Versions))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, area, &mut self.version_state);
    }

    fn render_books(&mut self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .books
            .iter()
            .map(|b| ListItem::new(b.name.clone()))
            .collect();
        let list = List::new(items)
            .block(self.pane_block("Book", Pane::Books))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, area, &mut self.book_state);
    }

    fn render_chapters(&mut self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .chapters
            .iter()
            .map(|c| ListItem::new(format!("Chapter {}", c.number)))
            .collect();
        let list = List::new(items)
            .block(self.pane_block("Chapter", Pane::Chapters))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, area, &mut self.chapter_state);
    }

    fn render_reader(&self, frame: &mut Frame, area: Rect) {
        let title = self
            .chapter
            .as_ref()
            .and_then(|c| c.reference.clone())
            .unwrap_or_else(|| "Reader".to_string());
        let mut lines: Vec<Line> = Vec::new();
        match &self.chapter {
            Some(chapter) => {
                if self.verses.is_empty() {
                    // no strategy recognized the dialect, show the content as-is
                    if let RawContent::Markup(raw) = &chapter.content {
                        lines.push(Line::from(flatten_markup(raw)));
                    }
                } else {
                    for verse in &self.verses {
                        lines.push(Line::from(vec![
                            Span::styled(
                                format!("{:>3} ", verse.number),
                                Style::default().fg(Color::DarkGray),
                            ),
                            Span::raw(flatten_markup(&verse.content)),
                        ]));
                    }
                }
                if let Some(copyright) = &chapter.copyright {
                    lines.push(Line::from(""));
                    lines.push(Line::from(Span::styled(
                        copyright.clone(),
                        Style::default()
                            .fg(Color::DarkGray)
                            .add_modifier(Modifier::ITALIC),
                    )));
                }
            }
            None => {
                lines.push(Line::from(
                    "Pick a version, book, and chapter to start reading.",
                ));
            }
        }
        let paragraph = Paragraph::new(Text::from(lines))
            .block(self.pane_block(&title, Pane::Reader))
            .wrap(Wrap { trim: false })
            .scroll((self.offset as u16, 0));
        frame.render_widget(paragraph, area);
    }

    fn render_search(&self, frame: &mut Frame, area: Rect) {
        let mut lines = vec![
            Line::from(format!("query: {}_", self.search_query)),
            Line::from(""),
        ];
        match &self.search_hits {
            Some(hits) => {
                if hits.verses.is_empty() {
                    lines.push(Line::from("No results found."));
                } else {
                    if let Some(total) = hits.total {
                        lines.push(Line::from(Span::styled(
                            format!("{total} result(s)"),
                            Style::default().fg(Color::DarkGray),
                        )));
                        lines.push(Line::from(""));
                    }
                    let width = (area.width.saturating_sub(4)).max(20) as usize;
                    for hit in &hits.verses {
                        lines.push(Line::from(Span::styled(
                            hit.reference.clone(),
                            Style::default().add_modifier(Modifier::BOLD),
                        )));
                        for wrapped in textwrap::wrap(&flatten_markup(&hit.text), width) {
                            lines.push(Line::from(format!("  {wrapped}")));
                        }
                        lines.push(Line::from(""));
                    }
                }
            }
            None => lines.push(Line::from("Type a query and press enter.")),
        }
        let paragraph = Paragraph::new(Text::from(lines))
            .block(self.pane_block("Search", Pane::Search))
            .scroll((self.offset as u16, 0));
        frame.render_widget(paragraph, area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let footer = match &self.status {
            Some(message) => Paragraph::new(message.as_str())
                .alignment(Alignment::Left)
                .style(Style::default().fg(Color::Red)),
            None => {
                let hint = if self.pane == Pane::Search {
                    " run (enter) | back (esc) | scroll (up/down) "
                } else {
                    " quit (q) | panes (tab) | move (j/k) | open (enter) | search (/) | chapter (n/p) "
                };
                Paragraph::new(hint)
                    .alignment(Alignment::Left)
                    .wrap(Wrap { trim: true })
                    .style(Style::default())
            }
        };
        frame.render_widget(footer, area);
    }

    fn pane_block(&self, title: &str, pane: Pane) -> Block<'static> {
        let border = if self.pane == pane {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(border)
            .title(title.to_string())
    }

    // input

    fn handle_crossterm_event(&mut self) -> Result<()> {
        if let Event::Key(key) = event::read()? {
            self.on_key(key);
        }
        Ok(())
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.pane == Pane::Search {
            self.on_search_key(key);
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.running = false,
            KeyCode::Tab => self.next_pane(),
            KeyCode::BackTab => self.prev_pane(),
            KeyCode::Char('/') => {
                self.pane = Pane::Search;
                self.search_hits = None;
                self.offset = 0;
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_down(),
            KeyCode::Char('k') | KeyCode::Up => self.move_up(),
            KeyCode::Enter => self.activate(),
            KeyCode::Char('n') => self.next_chapter(),
            KeyCode::Char('p') => self.prev_chapter(),
            _ => {}
        }
    }

    fn on_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.pane = if self.chapter.is_some() {
                    Pane::Reader
                } else {
                    Pane::Versions
                };
                self.search_hits = None;
                self.offset = 0;
            }
            KeyCode::Enter => self.run_search(),
            KeyCode::Backspace => {
                self.search_query.pop();
            }
            KeyCode::Down => self.scroll_down(),
            KeyCode::Up => self.scroll_up(),
            KeyCode::Char(c) => self.search_query.push(c),
            _ => {}
        }
    }

    fn next_pane(&mut self) {
        self.pane = match self.pane {
            Pane::Versions => Pane::Books,
            Pane::Books => Pane::Chapters,
            Pane::Chapters => Pane::Reader,
            Pane::Reader | Pane::Search => Pane::Versions,
        };
    }

    fn prev_pane(&mut self) {
        self.pane = match self.pane {
            Pane::Versions => Pane::Reader,
            Pane::Books => Pane::Versions,
            Pane::Chapters => Pane::Books,
            Pane::Reader | Pane::Search => Pane::Chapters,
        };
    }

    fn activate(&mut self) {
        match self.pane {
            Pane::Versions => {
                self.load_books();
                if !self.books.is_empty() {
                    self.pane = Pane::Books;
                }
            }
            Pane::Books => {
                self.load_chapters();
                if !self.chapters.is_empty() {
                    self.pane = Pane::Chapters;
                }
            }
            Pane::Chapters => {
                self.load_chapter();
                if self.chapter.is_some() {
                    self.pane = Pane::Reader;
                }
            }
            Pane::Reader | Pane::Search => {}
        }
    }

    fn next_chapter(&mut self) {
        let Some(link) = self.chapter.as_ref().and_then(|c| c.next.clone()) else {
            return;
        };
        self.open_chapter_link(link);
    }

    fn prev_chapter(&mut self) {
        let Some(link) = self.chapter.as_ref().and_then(|c| c.previous.clone()) else {
            return;
        };
        self.open_chapter_link(link);
    }

    fn open_chapter_link(&mut self, link: ChapterLink) {
        if self.selected_book().map(|b| b.id.as_str()) != Some(link.book_id.as_str()) {
            // the link crosses into another book, reload its chapter list
            let Some(bi) = self.books.iter().position(|b| b.id == link.book_id) else {
                return;
            };
            self.book_state.select(Some(bi));
            self.load_chapters();
        }
        let Some(ci) = self.chapters.iter().position(|c| c.id == link.id) else {
            return;
        };
        self.chapter_state.select(Some(ci));
        self.load_chapter();
        if self.chapter.is_some() {
            self.pane = Pane::Reader;
        }
    }

    fn move_down(&mut self) {
        match self.pane {
            Pane::Versions => select_next(&mut self.version_state, self.versions.len()),
            Pane::Books => select_next(&mut self.book_state, self.books.len()),
            Pane::Chapters => select_next(&mut self.chapter_state, self.chapters.len()),
            Pane::Reader => self.scroll_down(),
            Pane::Search => {}
        }
    }

    fn move_up(&mut self) {
        match self.pane {
            Pane::Versions => select_prev(&mut self.version_state),
            Pane::Books => select_prev(&mut self.book_state),
            Pane::Chapters => select_prev(&mut self.chapter_state),
            Pane::Reader => self.scroll_up(),
            Pane::Search => {}
        }
    }

    fn scroll_down(&mut self) {
        let rows = self.scroll_rows();
        if rows > 0 && self.offset < rows - 1 {
            self.offset += 1;
        }
    }

    fn scroll_up(&mut self) {
        if self.offset > 0 {
            self.offset -= 1;
        }
    }

    // pre-wrap row estimate, only used to bound scrolling
    fn scroll_rows(&self) -> usize {
        if let Some(hits) = &self.search_hits {
            hits.verses.len().saturating_mul(3)
        } else if !self.verses.is_empty() {
            self.verses.len().saturating_add(2)
        } else if let Some(chapter) = &self.chapter {
            match &chapter.content {
                RawContent::Markup(raw) => raw.len() / 40 + 1,
                RawContent::Segmented { .. } => 1,
            }
        } else {
            1
        }
    }
}

fn select_next(state: &mut ListState, len: usize) {
    if len == 0 {
        return;
    }
    let next = match state.selected() {
        Some(i) if i + 1 < len => i + 1,
        Some(i) => i,
        None => 0,
    };
    state.select(Some(next));
}

fn select_prev(state: &mut ListState) {
    if let Some(i) = state.selected() {
        state.select(Some(i.saturating_sub(1)));
    }
}

/// Collapses markup to the plain text a terminal can show. Inline tags are
/// dropped, whitespace runs become single spaces.
fn flatten_markup(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    let text: String = fragment.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_drops_inline_tags() {
        assert_eq!(
            flatten_markup("<em>And God saw</em> the <b>light</b>"),
            "And God saw the light"
        );
    }

    #[test]
    fn flatten_collapses_whitespace() {
        assert_eq!(flatten_markup("In  the\n  beginning"), "In the beginning");
    }

    #[test]
    fn flatten_keeps_plain_text() {
        assert_eq!(flatten_markup("1 In the beginning"), "1 In the beginning");
    }

    #[test]
    fn select_next_clamps_to_end() {
        let mut state = ListState::default();
        select_next(&mut state, 2);
        assert_eq!(state.selected(), Some(0));
        select_next(&mut state, 2);
        assert_eq!(state.selected(), Some(1));
        select_next(&mut state, 2);
        assert_eq!(state.selected(), Some(1));
    }

    #[test]
    fn select_prev_stops_at_start() {
        let mut state = ListState::default();
        state.select(Some(1));
        select_prev(&mut state);
        select_prev(&mut state);
        assert_eq!(state.selected(), Some(0));
    }
}
