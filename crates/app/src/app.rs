//! Main window: toolbar, bookmarks, search bar, page view and dialogs.

use crate::clipboard;
use crate::scene::{displayed_size, drag_region, scene_point};
use doc_model::{BookmarkSet, Point, Rect, Word, ZoomAction, ZoomMode};
use eframe::egui;
use pdf_engine::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{Settings, Storage};
use tracing::{info, warn};
use viewer_core::{Editor, RenderedPage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Tool {
    #[default]
    Select,
    EditText,
    Annotations,
    RegionText,
    RegionScreenshot,
    Hand,
}

impl Tool {
    const ALL: [Tool; 6] = [
        Tool::Select,
        Tool::EditText,
        Tool::Annotations,
        Tool::RegionText,
        Tool::RegionScreenshot,
        Tool::Hand,
    ];

    fn label(self) -> &'static str {
        match self {
            Tool::Select => "Select",
            Tool::EditText => "Edit text",
            Tool::Annotations => "Annotations",
            Tool::RegionText => "Region text",
            Tool::RegionScreenshot => "Region screenshot",
            Tool::Hand => "Hand",
        }
    }

    fn hint(self) -> &'static str {
        match self {
            Tool::Select => "Click a word to select it",
            Tool::EditText => "Click a word to replace it",
            Tool::Annotations => "Click to select, drag to move, Delete to remove",
            Tool::RegionText => "Drag a rectangle to copy its text",
            Tool::RegionScreenshot => "Drag a rectangle to copy it as an image",
            Tool::Hand => "Drag to pan",
        }
    }
}

struct ErrorDialogState {
    title: String,
    message: String,
}

struct EditDialogState {
    page_index: u32,
    word: Word,
    replacement: String,
    focus_requested: bool,
}

#[derive(Default)]
struct SearchBarState {
    visible: bool,
    query: String,
    case_sensitive: bool,
    /// Query and case flag of the last search that ran.
    last_run: Option<(String, bool)>,
    focus_requested: bool,
}

/// Uploaded texture for the page image the editor last returned.
struct PageTexture {
    image: Arc<RgbaImage>,
    handle: egui::TextureHandle,
}

/// A drag in progress on the page, in screen positions.
#[derive(Clone, Copy)]
struct DragState {
    origin: egui::Pos2,
    current: egui::Pos2,
}

pub struct VellumApp {
    editor: Editor,
    storage: Option<Storage>,
    settings: Settings,
    bookmarks: BookmarkSet,

    tool: Tool,
    texture: Option<PageTexture>,
    drag: Option<DragState>,
    warm_pending: bool,

    page_input: String,
    zoom_input: String,
    bookmark_label: String,
    window_title: String,
    status: Option<String>,

    search_bar: SearchBarState,
    edit_dialog: Option<EditDialogState>,
    error_dialog: Option<ErrorDialogState>,
}

impl VellumApp {
    pub fn new(
        editor: Editor,
        storage: Option<Storage>,
        settings: Settings,
        initial_file: Option<PathBuf>,
    ) -> Self {
        let bookmarks = match storage.as_ref().map(Storage::load_bookmarks).transpose() {
            Ok(bookmarks) => bookmarks.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "could not load bookmarks");
                BookmarkSet::default()
            }
        };

        let mut app = Self {
            editor,
            storage,
            settings,
            bookmarks,
            tool: Tool::default(),
            texture: None,
            drag: None,
            warm_pending: false,
            page_input: String::new(),
            zoom_input: String::new(),
            bookmark_label: String::new(),
            window_title: String::new(),
            status: None,
            search_bar: SearchBarState::default(),
            edit_dialog: None,
            error_dialog: None,
        };

        match initial_file {
            Some(path) => app.load_document(&path),
            None if app.settings.restore_session => app.restore_last_session(),
            None => {}
        }

        app
    }

    fn show_error(&mut self, title: &str, message: impl std::fmt::Display) {
        warn!(title, error = %message, "showing error dialog");
        self.error_dialog = Some(ErrorDialogState { title: title.to_owned(), message: message.to_string() });
    }

    fn restore_last_session(&mut self) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };

        let session = match storage.load_session() {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "could not load session");
                return;
            }
        };

        let Some(path) = session.last_file.clone() else {
            return;
        };
        if !path.is_file() {
            info!(path = %path.display(), "last session file is gone, starting empty");
            return;
        }

        self.load_document(&path);
        if self.editor.is_open() {
            self.editor.restore_session(&session);
            self.after_navigation();
        }
    }

    fn persist_session(&self) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };
        if !self.editor.is_open() {
            return;
        }

        if let Err(err) = storage.save_session(&self.editor.session()) {
            warn!(error = %err, "could not save session");
        }
    }

    fn persist_bookmarks(&self) {
        if let Some(storage) = self.storage.as_ref() {
            if let Err(err) = storage.save_bookmarks(&self.bookmarks) {
                warn!(error = %err, "could not save bookmarks");
            }
        }
    }

    /// Ask before throwing away unsaved edits. Returns whether to go on.
    fn confirm_discard(&self) -> bool {
        if !self.editor.is_dirty() {
            return true;
        }

        let answer = rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Warning)
            .set_title("Unsaved changes")
            .set_description("The open document has unsaved edits. Discard them?")
            .set_buttons(rfd::MessageButtons::YesNo)
            .show();
        answer == rfd::MessageDialogResult::Yes
    }

    fn open_dialog(&mut self) {
        if !self.confirm_discard() {
            return;
        }

        if let Some(path) = rfd::FileDialog::new().add_filter("PDF", &["pdf"]).pick_file() {
            self.load_document(&path);
        }
    }

    fn load_document(&mut self, path: &Path) {
        match self.editor.open(path) {
            Ok(pages) => {
                self.texture = None;
                self.drag = None;
                self.edit_dialog = None;
                self.search_bar.last_run = None;
                self.status = Some(format!("Opened {} ({pages} pages)", path.display()));
                self.after_navigation();
            }
            Err(err) => self.show_error("Could not open document", err),
        }
    }

    fn save(&mut self) {
        match self.editor.save() {
            Ok(()) => self.status = Some("Saved".to_owned()),
            Err(err) => self.show_error("Could not save document", err),
        }
    }

    fn save_as_dialog(&mut self) {
        let file_name = self
            .editor
            .path()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_owned());

        let Some(path) =
            rfd::FileDialog::new().add_filter("PDF", &["pdf"]).set_file_name(file_name).save_file()
        else {
            return;
        };

        match self.editor.save_as(&path) {
            Ok(()) => {
                self.status = Some(format!("Saved as {}", path.display()));
                self.persist_session();
            }
            Err(err) => self.show_error("Could not save document", err),
        }
    }

    fn on_close(&self) {
        if self.editor.is_dirty() {
            warn!("closing with unsaved edits");
        }
        self.persist_session();
    }

    /// Bookkeeping after the current page or zoom changed.
    fn after_navigation(&mut self) {
        self.drag = None;
        self.warm_pending = true;
        self.persist_session();
    }

    fn next_page(&mut self) {
        if self.editor.next_page() {
            self.after_navigation();
        }
    }

    fn prev_page(&mut self) {
        if self.editor.prev_page() {
            self.after_navigation();
        }
    }

    fn goto_page(&mut self, page_number: u32) {
        if self.editor.goto_page(page_number) {
            self.after_navigation();
        }
    }

    fn zoom(&mut self, action: ZoomAction) {
        self.editor.apply_zoom(action);
        self.after_navigation();
    }

    fn run_search(&mut self, backwards: bool) {
        let query = self.search_bar.query.trim().to_owned();
        if query.is_empty() {
            self.editor.clear_search();
            self.search_bar.last_run = None;
            return;
        }

        let key = (query.clone(), self.search_bar.case_sensitive);
        let page_before = self.editor.current_page();

        if self.search_bar.last_run.as_ref() == Some(&key) {
            if backwards {
                self.editor.prev_hit();
            } else {
                self.editor.next_hit();
            }
        } else {
            match self.editor.search(&query, self.search_bar.case_sensitive) {
                Ok(0) => self.status = Some(format!("No matches for {query:?}")),
                Ok(_) => {}
                Err(err) => {
                    self.show_error("Search failed", err);
                    return;
                }
            }
            self.search_bar.last_run = Some(key);
        }

        if self.editor.current_page() != page_before {
            self.after_navigation();
        }
    }

    fn close_search(&mut self) {
        self.search_bar.visible = false;
        self.search_bar.last_run = None;
        self.editor.clear_search();
    }

    fn apply_edit(&mut self) {
        let Some(dialog) = self.edit_dialog.take() else {
            return;
        };

        match self.editor.edit_word(dialog.page_index, &dialog.word, &dialog.replacement) {
            Ok(outcome) => {
                self.status = Some(match outcome.inserted {
                    Some(inserted) => format!(
                        "Replaced {:?} with {inserted:?} ({} {})",
                        outcome.removed,
                        outcome.font.postscript_name(),
                        outcome.size
                    ),
                    None => format!("Deleted {:?}", outcome.removed),
                });
            }
            Err(err) => self.show_error("Could not edit word", err),
        }
    }

    fn delete_selected_annotation(&mut self) {
        match self.editor.delete_selected_annotation() {
            Ok(annotation) => self.status = Some(format!("Deleted {}", annotation.kind.label())),
            Err(err) => self.show_error("Could not delete annotation", err),
        }
    }

    fn finish_region(&mut self, region: Rect) {
        match self.tool {
            Tool::RegionText => match self.editor.text_in_scene_region(&region) {
                Ok(text) if text.is_empty() => self.status = Some("No text in region".to_owned()),
                Ok(text) => match clipboard::copy_text(&text) {
                    Ok(()) => {
                        self.status = Some(format!("Copied {} characters", text.chars().count()))
                    }
                    Err(err) => self.show_error("Clipboard", err),
                },
                Err(err) => self.show_error("Could not extract text", err),
            },
            Tool::RegionScreenshot => match self.editor.screenshot_scene_region(&region) {
                Ok(image) => match clipboard::copy_image(&image) {
                    Ok(()) => {
                        let (width, height) = image.dimensions();
                        self.status = Some(format!("Copied {width}x{height} screenshot"));
                    }
                    Err(err) => self.show_error("Clipboard", err),
                },
                Err(err) => self.show_error("Could not take screenshot", err),
            },
            _ => {}
        }
    }

    fn toggle_bookmark(&mut self) {
        let Some(path) = self.editor.path().map(Path::to_path_buf) else {
            return;
        };
        let page = self.editor.current_page();

        if self.bookmarks.is_bookmarked(&path, page) {
            self.bookmarks.remove(&path, page);
        } else {
            let label = match self.bookmark_label.trim() {
                "" => format!("Page {}", page + 1),
                label => label.to_owned(),
            };
            self.bookmarks.add(&path, page, label);
            self.bookmark_label.clear();
        }
        self.persist_bookmarks();
    }

    fn texture_for(&mut self, ctx: &egui::Context, rendered: &RenderedPage) -> egui::TextureId {
        if let Some(texture) = &self.texture {
            if Arc::ptr_eq(&texture.image, &rendered.image) {
                return texture.handle.id();
            }
        }

        let (width, height) = rendered.image.dimensions();
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [width as usize, height as usize],
            rendered.image.as_raw(),
        );
        let handle = ctx.load_texture(
            format!("page_{}", rendered.page_index),
            image,
            egui::TextureOptions::LINEAR,
        );
        let id = handle.id();
        self.texture = Some(PageTexture { image: Arc::clone(&rendered.image), handle });
        id
    }

    fn sync_window_title(&mut self, ctx: &egui::Context) {
        let title = match self.editor.path().and_then(Path::file_name) {
            Some(name) if self.editor.is_dirty() => format!("{} * - Vellum", name.to_string_lossy()),
            Some(name) => format!("{} - Vellum", name.to_string_lossy()),
            None => "Vellum".to_owned(),
        };

        if title != self.window_title {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title.clone()));
            self.window_title = title;
        }
    }
}

impl eframe::App for VellumApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keyboard_shortcuts(ctx);
        self.draw_toolbar(ctx);
        self.draw_search_bar(ctx);
        self.draw_status_bar(ctx);
        self.draw_bookmarks(ctx);
        self.draw_page(ctx);
        self.draw_edit_dialog(ctx);
        self.draw_error_dialog(ctx);
        self.sync_window_title(ctx);

        if ctx.input(|i| i.viewport().close_requested()) {
            self.on_close();
        }
    }
}

impl VellumApp {
    fn handle_keyboard_shortcuts(&mut self, ctx: &egui::Context) {
        let typing = ctx.wants_keyboard_input();
        let (command, escape, next, prev, delete, zoom_in, zoom_out) = ctx.input(|i| {
            let cmd = i.modifiers.command;
            (
                cmd.then(|| {
                    if i.key_pressed(egui::Key::F) {
                        Some(egui::Key::F)
                    } else if i.key_pressed(egui::Key::O) {
                        Some(egui::Key::O)
                    } else if i.key_pressed(egui::Key::S) {
                        Some(egui::Key::S)
                    } else {
                        None
                    }
                })
                .flatten(),
                i.key_pressed(egui::Key::Escape),
                i.key_pressed(egui::Key::PageDown) || i.key_pressed(egui::Key::ArrowRight),
                i.key_pressed(egui::Key::PageUp) || i.key_pressed(egui::Key::ArrowLeft),
                i.key_pressed(egui::Key::Delete),
                cmd && (i.key_pressed(egui::Key::Plus) || i.key_pressed(egui::Key::Equals)),
                cmd && i.key_pressed(egui::Key::Minus),
            )
        });

        match command {
            Some(egui::Key::F) => {
                self.search_bar.visible = true;
                self.search_bar.focus_requested = true;
            }
            Some(egui::Key::O) => self.open_dialog(),
            Some(egui::Key::S) if self.editor.is_open() => self.save(),
            _ => {}
        }

        if escape {
            if self.error_dialog.is_some() {
                self.error_dialog = None;
            } else if self.edit_dialog.is_some() {
                self.edit_dialog = None;
            } else if self.search_bar.visible {
                self.close_search();
            } else {
                self.drag = None;
            }
        }

        if zoom_in {
            self.editor.zoom_in();
            self.after_navigation();
        }
        if zoom_out {
            self.editor.zoom_out();
            self.after_navigation();
        }

        if typing || self.edit_dialog.is_some() {
            return;
        }
        if next {
            self.next_page();
        }
        if prev {
            self.prev_page();
        }
        if delete && self.tool == Tool::Annotations && self.editor.selected_annotation().is_some() {
            self.delete_selected_annotation();
        }
    }

    fn draw_toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                if ui.button("📂 Open").clicked() {
                    self.open_dialog();
                }

                let open = self.editor.is_open();
                if ui.add_enabled(open && self.editor.is_dirty(), egui::Button::new("💾 Save")).clicked() {
                    self.save();
                }
                if ui.add_enabled(open, egui::Button::new("Save As…")).clicked() {
                    self.save_as_dialog();
                }

                ui.separator();

                ui.add_enabled_ui(open, |ui| {
                    self.draw_navigation(ui);
                    ui.separator();
                    self.draw_zoom_controls(ui);
                    ui.separator();

                    let mut debug = self.editor.debug_overlay();
                    if ui.toggle_value(&mut debug, "Debug").on_hover_text("Outline every word box").changed() {
                        self.editor.toggle_debug(debug);
                        self.persist_session();
                    }

                    ui.separator();

                    for tool in Tool::ALL {
                        if ui.selectable_label(self.tool == tool, tool.label()).on_hover_text(tool.hint()).clicked() {
                            self.tool = tool;
                            self.drag = None;
                        }
                    }
                });
            });
        });
    }

    fn draw_navigation(&mut self, ui: &mut egui::Ui) {
        if ui.button("◀").clicked() {
            self.prev_page();
        }

        let response =
            ui.add(egui::TextEdit::singleline(&mut self.page_input).desired_width(36.0));
        if response.lost_focus() {
            match self.page_input.trim().parse::<u32>() {
                Ok(page_number) => self.goto_page(page_number),
                Err(_) => self.status = Some(format!("{:?} is not a page number", self.page_input)),
            }
        }
        if !response.has_focus() {
            self.page_input = (self.editor.current_page() + 1).to_string();
        }

        ui.label(format!("/ {}", self.editor.page_count()));

        if ui.button("▶").clicked() {
            self.next_page();
        }
    }

    fn draw_zoom_controls(&mut self, ui: &mut egui::Ui) {
        if ui.button("−").clicked() {
            self.editor.zoom_out();
            self.after_navigation();
        }

        let response =
            ui.add(egui::TextEdit::singleline(&mut self.zoom_input).desired_width(48.0));
        if response.lost_focus() {
            match self.editor.set_zoom_text(&self.zoom_input) {
                Ok(_) => self.after_navigation(),
                Err(err) => self.status = Some(err.to_string()),
            }
        }
        if !response.has_focus() {
            self.zoom_input = format!("{}%", self.editor.zoom_percent());
        }

        if ui.button("+").clicked() {
            self.editor.zoom_in();
            self.after_navigation();
        }

        let mode = self.editor.reader_state().zoom_mode;
        if ui.selectable_label(mode == ZoomMode::FitWidth, "Fit Width").clicked() {
            self.zoom(ZoomAction::FitWidth);
        }
        if ui.selectable_label(mode == ZoomMode::FitPage, "Fit Page").clicked() {
            self.zoom(ZoomAction::FitPage);
        }
        if ui.button("100%").clicked() {
            self.zoom(ZoomAction::ActualSize100);
        }
    }

    fn draw_search_bar(&mut self, ctx: &egui::Context) {
        if !self.search_bar.visible {
            return;
        }

        egui::TopBottomPanel::top("search_bar")
            .frame(egui::Frame::side_top_panel(&ctx.style()).inner_margin(8.0))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let response = ui.add(
                        egui::TextEdit::singleline(&mut self.search_bar.query)
                            .hint_text("Search…")
                            .desired_width(220.0),
                    );
                    if std::mem::take(&mut self.search_bar.focus_requested) {
                        response.request_focus();
                    }

                    let (enter, shift) =
                        ui.input(|i| (i.key_pressed(egui::Key::Enter), i.modifiers.shift));
                    if response.lost_focus() && enter {
                        self.run_search(shift);
                        response.request_focus();
                    }

                    ui.toggle_value(&mut self.search_bar.case_sensitive, "Aa")
                        .on_hover_text("Case sensitive");

                    ui.separator();

                    let total = self.editor.search_hits().len();
                    match (self.editor.current_hit_index(), &self.search_bar.last_run) {
                        (Some(index), Some(_)) => {
                            ui.label(format!("{} / {total}", index + 1));
                        }
                        (None, Some(_)) => {
                            ui.weak("No matches");
                        }
                        _ => {}
                    }

                    if ui.button("▲").on_hover_text("Previous match (Shift+Enter)").clicked() {
                        self.run_search(true);
                    }
                    if ui.button("▼").on_hover_text("Next match (Enter)").clicked() {
                        self.run_search(false);
                    }

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("✕").clicked() {
                            self.close_search();
                        }
                    });
                });
            });
    }

    fn draw_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.weak(self.tool.hint());
                ui.separator();

                if let Some(annotation) = self.editor.selected_annotation() {
                    let summary = match annotation.contents.as_deref() {
                        Some(contents) if !contents.is_empty() => {
                            format!("{}: {contents}", annotation.kind.label())
                        }
                        _ => annotation.kind.label().to_owned(),
                    };
                    ui.label(summary);
                    if ui.small_button("Delete").clicked() {
                        self.delete_selected_annotation();
                    }
                    ui.separator();
                } else if let Some(word) = self.editor.selected_word() {
                    ui.label(format!("Word: {}", word.text));
                    ui.separator();
                }

                if let Some(status) = &self.status {
                    ui.label(status.as_str());
                }
            });
        });
    }

    fn draw_bookmarks(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("bookmarks").default_width(170.0).resizable(true).show(ctx, |ui| {
            ui.heading("Bookmarks");
            ui.separator();

            let Some(path) = self.editor.path().map(Path::to_path_buf) else {
                ui.weak("No document loaded");
                return;
            };

            let current = self.editor.current_page();
            let bookmarked = self.bookmarks.is_bookmarked(&path, current);

            ui.horizontal(|ui| {
                ui.add(
                    egui::TextEdit::singleline(&mut self.bookmark_label)
                        .hint_text(format!("Page {}", current + 1))
                        .desired_width(90.0),
                );
                let label = if bookmarked { "Remove" } else { "Add" };
                if ui.button(label).clicked() {
                    self.toggle_bookmark();
                }
            });

            if bookmarked && !self.bookmark_label.trim().is_empty() && ui.button("Rename").clicked() {
                let label = self.bookmark_label.trim().to_owned();
                if self.bookmarks.rename(&path, current, label) {
                    self.bookmark_label.clear();
                    self.persist_bookmarks();
                }
            }

            ui.separator();

            let mut jump = None;
            let mut remove = None;
            egui::ScrollArea::vertical().show(ui, |ui| {
                let bookmarks = self.bookmarks.for_document(&path);
                if bookmarks.is_empty() {
                    ui.weak("No bookmarks yet");
                }
                for bookmark in bookmarks {
                    ui.horizontal(|ui| {
                        let text = format!("{}  {}", bookmark.page + 1, bookmark.label);
                        if ui.selectable_label(bookmark.page == current, text).clicked() {
                            jump = Some(bookmark.page);
                        }
                        if ui.small_button("✕").on_hover_text("Remove bookmark").clicked() {
                            remove = Some(bookmark.page);
                        }
                    });
                }
            });

            if let Some(page) = jump {
                self.goto_page(page + 1);
            }
            if let Some(page) = remove {
                self.bookmarks.remove(&path, page);
                self.persist_bookmarks();
            }
        });
    }

    fn draw_page(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if !self.editor.is_open() {
                ui.centered_and_justified(|ui| {
                    ui.heading("Open a PDF to get started");
                });
                return;
            }

            let available = ui.available_size();
            self.editor.set_viewport(available.x, available.y);

            let rendered = match self.editor.render_current() {
                Ok(rendered) => rendered,
                Err(err) => {
                    let color = ui.visuals().error_fg_color;
                    ui.colored_label(color, format!("Failed to render page: {err}"));
                    return;
                }
            };
            let texture_id = self.texture_for(ctx, &rendered);
            let pixels = rendered.image.dimensions();
            let size = displayed_size(pixels, self.editor.config().render_scale);

            egui::ScrollArea::both().auto_shrink([false, false]).show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    let (image_rect, response) = ui.allocate_exact_size(size, egui::Sense::click_and_drag());
                    ui.painter().image(
                        texture_id,
                        image_rect,
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                    self.handle_page_input(ui, &response, image_rect, pixels);
                });
            });

            if std::mem::take(&mut self.warm_pending) {
                self.editor.warm_neighbours(1);
            }
        });
    }

    fn handle_page_input(
        &mut self,
        ui: &mut egui::Ui,
        response: &egui::Response,
        image_rect: egui::Rect,
        pixels: (u32, u32),
    ) {
        let to_scene = |pos: egui::Pos2| -> Point { scene_point(pos, image_rect, pixels) };

        if self.tool == Tool::Hand {
            if response.dragged() {
                ui.scroll_with_delta(response.drag_delta());
            }
            return;
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.click_page(to_scene(pos));
            }
        }

        if response.drag_started() {
            let origin = ui.input(|i| i.pointer.press_origin()).or(response.interact_pointer_pos());
            if let Some(origin) = origin {
                self.drag = Some(DragState { origin, current: origin });
                if self.tool == Tool::Annotations {
                    if let Err(err) = self.editor.select_annotation_at_scene(to_scene(origin)) {
                        self.show_error("Annotations", err);
                    }
                }
            }
        }

        if response.dragged() {
            if let (Some(drag), Some(pos)) = (self.drag.as_mut(), response.interact_pointer_pos()) {
                drag.current = pos;
            }
        }

        if let Some(drag) = self.drag {
            if matches!(self.tool, Tool::RegionText | Tool::RegionScreenshot | Tool::Annotations) {
                let preview = egui::Rect::from_two_pos(drag.origin, drag.current);
                let color = ui.visuals().selection.stroke.color;
                if self.tool == Tool::Annotations {
                    ui.painter().line_segment([drag.origin, drag.current], egui::Stroke::new(1.5, color));
                } else {
                    ui.painter().rect_stroke(preview, 0.0, egui::Stroke::new(1.5, color), egui::StrokeKind::Inside);
                }
            }
        }

        if response.drag_stopped() {
            if let Some(drag) = self.drag.take() {
                self.finish_drag(to_scene(drag.origin), to_scene(drag.current));
            }
        }
    }

    fn click_page(&mut self, point: Point) {
        match self.tool {
            Tool::Select => {
                self.editor.select_word_at_scene(point);
            }
            Tool::EditText => {
                if let Some(word) = self.editor.select_word_at_scene(point) {
                    self.edit_dialog = Some(EditDialogState {
                        page_index: self.editor.current_page(),
                        replacement: word.text.clone(),
                        word,
                        focus_requested: true,
                    });
                }
            }
            Tool::Annotations => {
                if let Err(err) = self.editor.select_annotation_at_scene(point) {
                    self.show_error("Annotations", err);
                }
            }
            Tool::RegionText | Tool::RegionScreenshot | Tool::Hand => {}
        }
    }

    fn finish_drag(&mut self, from: Point, to: Point) {
        match self.tool {
            Tool::Annotations if self.editor.selected_annotation().is_some() => {
                let (dx, dy) = (to.x - from.x, to.y - from.y);
                if dx == 0.0 && dy == 0.0 {
                    return;
                }
                match self.editor.move_selected_annotation(dx, dy) {
                    Ok(moved) => self.status = Some(format!("Moved {}", moved.kind.label())),
                    Err(err) => self.show_error("Could not move annotation", err),
                }
            }
            Tool::RegionText | Tool::RegionScreenshot => {
                if let Some(region) = drag_region(from, to) {
                    self.finish_region(region);
                }
            }
            _ => {}
        }
    }

    fn draw_edit_dialog(&mut self, ctx: &egui::Context) {
        let Some(dialog) = self.edit_dialog.as_mut() else {
            return;
        };

        let mut apply = false;
        let mut cancel = false;

        egui::Window::new("Edit word")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(format!("Page {}: {:?}", dialog.page_index + 1, dialog.word.text));
                let response = ui.add(
                    egui::TextEdit::singleline(&mut dialog.replacement)
                        .hint_text("Leave empty to delete")
                        .desired_width(240.0),
                );
                if std::mem::take(&mut dialog.focus_requested) {
                    response.request_focus();
                }
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    apply = true;
                }

                ui.add_space(12.0);
                ui.horizontal(|ui| {
                    if ui.button("Cancel").clicked() {
                        cancel = true;
                    }
                    if ui.button("Apply").clicked() {
                        apply = true;
                    }
                });
            });

        if apply {
            self.apply_edit();
        } else if cancel {
            self.edit_dialog = None;
        }
    }

    fn draw_error_dialog(&mut self, ctx: &egui::Context) {
        let Some(error) = &self.error_dialog else {
            return;
        };

        let title = format!("❌ {}", error.title);
        let message = error.message.clone();

        let mut should_close = false;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(&message);
                ui.add_space(12.0);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
                    if ui.button("OK").clicked() {
                        should_close = true;
                    }
                });
            });

        if should_close {
            self.error_dialog = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::AnnotationKind;
    use pdf_engine::{MemoryDocument, MemoryEngine, MemoryPage};
    use viewer_core::EditorConfig;

    struct Fixture {
        _temp: tempfile::TempDir,
        document: PathBuf,
        storage: Storage,
    }

    fn fixture() -> Fixture {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let document = temp.path().join("doc.json");
        let pages = MemoryDocument::new(vec![
            MemoryPage::new(300.0, 200.0)
                .with_line(20.0, 20.0, "The quick brown fox", "Helvetica", 10.0)
                .with_annotation(AnnotationKind::Square, Rect::new(200.0, 100.0, 260.0, 160.0), None),
            MemoryPage::new(300.0, 200.0).with_line(20.0, 20.0, "second page", "Courier", 9.0),
            MemoryPage::new(300.0, 200.0),
        ]);
        std::fs::write(&document, pages.to_json().expect("json")).expect("fixture should be written");

        let storage = Storage::with_root(temp.path().join("state"));
        Fixture { _temp: temp, document, storage }
    }

    /// App on the memory backend with one scene pixel per page point.
    fn app(fixture: &Fixture, initial_file: Option<PathBuf>) -> VellumApp {
        let settings = Settings { render_scale: 1.0, ..Settings::default() };
        let editor = Editor::new(Box::new(MemoryEngine::new()), EditorConfig::from(&settings));
        VellumApp::new(editor, Some(fixture.storage.clone()), settings, initial_file)
    }

    fn saved_page(fixture: &Fixture) -> u32 {
        fixture.storage.load_session().expect("session should load").page
    }

    #[test]
    fn every_tool_has_a_distinct_label() {
        let mut labels: Vec<_> = Tool::ALL.iter().map(|tool| tool.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), Tool::ALL.len());
        assert_eq!(Tool::default(), Tool::Select);
    }

    #[test]
    fn select_tool_selects_the_clicked_word() {
        let fixture = fixture();
        let mut app = app(&fixture, Some(fixture.document.clone()));

        app.click_page(Point::new(25.0, 25.0));

        assert_eq!(app.editor.selected_word().map(|word| word.text.as_str()), Some("The"));
        assert!(app.edit_dialog.is_none());
    }

    #[test]
    fn edit_tool_opens_the_dialog_and_applies_the_replacement() {
        let fixture = fixture();
        let mut app = app(&fixture, Some(fixture.document.clone()));
        app.tool = Tool::EditText;

        app.click_page(Point::new(25.0, 25.0));
        let dialog = app.edit_dialog.as_mut().expect("dialog should open");
        assert_eq!(dialog.word.text, "The");
        assert_eq!(dialog.replacement, "The");
        dialog.replacement = "A".to_owned();

        app.apply_edit();

        assert!(app.edit_dialog.is_none());
        assert!(app.editor.is_dirty());
        assert!(app.status.as_deref().is_some_and(|status| status.starts_with("Replaced")));
        let first = &app.editor.logical().expect("open").page_words(0)[0];
        assert_eq!(first.text, "A");
    }

    #[test]
    fn annotation_tool_selects_and_drags_annotations() {
        let fixture = fixture();
        let mut app = app(&fixture, Some(fixture.document.clone()));
        app.tool = Tool::Annotations;

        app.click_page(Point::new(230.0, 130.0));
        assert!(app.editor.selected_annotation().is_some());

        app.finish_drag(Point::new(230.0, 130.0), Point::new(240.0, 150.0));

        let moved = app.editor.selected_annotation().expect("still selected");
        assert_eq!(moved.rect, Rect::new(210.0, 120.0, 270.0, 180.0));
        assert_eq!(app.status.as_deref(), Some("Moved Rectangle"));
    }

    #[test]
    fn hand_tool_ignores_clicks() {
        let fixture = fixture();
        let mut app = app(&fixture, Some(fixture.document.clone()));
        app.tool = Tool::Hand;

        app.click_page(Point::new(25.0, 25.0));

        assert!(app.editor.selected_word().is_none());
        assert!(app.editor.selected_annotation().is_none());
        assert!(app.edit_dialog.is_none());
    }

    #[test]
    fn navigation_saves_the_session() {
        let fixture = fixture();
        let mut app = app(&fixture, Some(fixture.document.clone()));
        assert_eq!(saved_page(&fixture), 0);

        app.next_page();
        assert_eq!(saved_page(&fixture), 1);

        app.goto_page(3);
        assert_eq!(saved_page(&fixture), 2);

        app.prev_page();
        let session = fixture.storage.load_session().expect("session should load");
        assert_eq!(session.page, 1);
        assert!(session.last_file.is_some());
    }

    #[test]
    fn closing_saves_the_session() {
        let fixture = fixture();
        let mut app = app(&fixture, Some(fixture.document.clone()));

        // Moved without going through the app, so nothing was saved yet.
        app.editor.goto_page(3);
        assert_eq!(saved_page(&fixture), 0);

        app.on_close();
        assert_eq!(saved_page(&fixture), 2);
    }

    #[test]
    fn launch_without_a_file_restores_the_last_session() {
        let fixture = fixture();
        let mut first = app(&fixture, Some(fixture.document.clone()));
        first.goto_page(2);
        drop(first);

        let restored = app(&fixture, None);
        assert!(restored.editor.is_open());
        assert_eq!(restored.editor.current_page(), 1);
    }
}
