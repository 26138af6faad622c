use ratatui::layout::Rect;
use ratatui_macros::vertical;

#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub title_bar: Rect,
    pub main_content: Rect,
    pub status_bar: Rect,
}

impl Layout {
    pub fn new(area: Rect) -> Self {
        let [title_bar, main_content, status_bar] = vertical![==1, *=1, ==1].areas(area);
        Self {
            title_bar,
            main_content,
            status_bar,
        }
    }

    pub fn fullscreen(area: Rect) -> Self {
        Self {
            title_bar: area,
            main_content: area,
            status_bar: area,
        }
    }
}
