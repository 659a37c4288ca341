// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cover pages for print jobs, rendered with `printpdf` 0.8.
//
// The cover is two A4 pages: the news page comes first because the printer
// stacks face down, so the last page ends up on top of the pile.

use chrono::Local;
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use tracing::{debug, info, instrument};

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);

/// Average Helvetica glyph width relative to the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// A short news entry printed on the back of the cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub headline: String,
    pub content: String,
}

/// Two-sided cover page naming who a print job is for.
#[derive(Debug, Clone)]
pub struct CoverPage {
    pub who: String,
    pub what: String,
    pub news: Vec<NewsItem>,
}

impl CoverPage {
    pub fn new(who: impl Into<String>, what: impl Into<String>) -> Self {
        Self {
            who: who.into(),
            what: what.into(),
            news: Vec::new(),
        }
    }

    pub fn with_news(mut self, news: Vec<NewsItem>) -> Self {
        self.news = news;
        self
    }

    /// Render the cover as PDF bytes.
    #[instrument(skip(self), fields(who = %self.who, what = %self.what))]
    pub fn render(&self) -> Vec<u8> {
        let mut doc = PdfDocument::new("Odie Deckblatt");
        doc.with_pages(vec![self.news_page(), self.front_page()]);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
        debug!(warnings = warnings.len(), "cover saved");
        info!(bytes = bytes.len(), "cover page rendered");
        bytes
    }

    fn news_page(&self) -> PdfPage {
        let mut ops = Vec::new();
        let mut y = PAGE_HEIGHT.into_pt().0 - 90.0;

        centered(&mut ops, "Termine & Aktuelles", BuiltinFont::HelveticaBold, 20.0, y);
        y -= 28.0;
        centered(&mut ops, "Immer aktuell unter", BuiltinFont::HelveticaBold, 14.0, y);
        y -= 18.0;
        centered(&mut ops, "http://www.fsmi.uni-karlsruhe.de", BuiltinFont::Courier, 12.0, y);
        y -= 40.0;

        let left = Mm(30.0).into_pt().0;
        for item in &self.news {
            text(&mut ops, &item.headline, BuiltinFont::HelveticaBold, 12.0, left, y);
            y -= 16.0;
            for line in item.content.lines() {
                text(&mut ops, line, BuiltinFont::Helvetica, 10.0, left, y);
                y -= 13.0;
            }
            y -= 10.0;
        }

        PdfPage::new(PAGE_WIDTH, PAGE_HEIGHT, ops)
    }

    fn front_page(&self) -> PdfPage {
        let mut ops = Vec::new();
        let middle = PAGE_HEIGHT.into_pt().0 / 2.0;

        centered(&mut ops, "Ausdruck für", BuiltinFont::HelveticaBold, 14.0, middle - 30.0);
        centered(&mut ops, &self.who, BuiltinFont::HelveticaBold, 60.0, middle - 100.0);
        centered(
            &mut ops,
            &format!("({})", self.what),
            BuiltinFont::HelveticaBold,
            20.0,
            middle - 140.0,
        );
        let printed = format!("Gedruckt am {}", Local::now().format("%d.%m.%Y"));
        centered(&mut ops, &printed, BuiltinFont::Helvetica, 10.0, 40.0);

        PdfPage::new(PAGE_WIDTH, PAGE_HEIGHT, ops)
    }
}

fn text(ops: &mut Vec<Op>, line: &str, font: BuiltinFont, size: f32, x: f32, y: f32) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size),
        font,
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(line.to_owned())],
        font,
    });
    ops.push(Op::EndTextSection);
}

/// Horizontally centred line; the width is estimated, builtin fonts carry no
/// metrics here.
fn centered(ops: &mut Vec<Op>, line: &str, font: BuiltinFont, size: f32, y: f32) {
    let width = line.chars().count() as f32 * size * AVG_GLYPH_WIDTH;
    let x = ((PAGE_WIDTH.into_pt().0 - width) / 2.0).max(10.0);
    text(ops, line, font, size, x, y);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::page_count_of;

    #[test]
    fn renders_two_pages() {
        let bytes = CoverPage::new("Erika Mustermann", "Lineare Algebra").render();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(page_count_of(&bytes).unwrap(), 2);
    }

    #[test]
    fn news_items_fit_on_the_back() {
        let cover = CoverPage::new("Max", "Numerik").with_news(vec![
            NewsItem {
                headline: "Klausurtagung".into(),
                content: "Freitag, 18 Uhr\nim Fachschaftsraum".into(),
            },
            NewsItem {
                headline: "Sommerfest".into(),
                content: "Anmeldung bis Ende Mai".into(),
            },
        ]);
        assert_eq!(page_count_of(&cover.render()).unwrap(), 2);
    }
}
