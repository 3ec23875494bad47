//! Zamzami ordering assistant — egui/eframe application.
//!
//! # Architecture
//!
//! [`ZamzamiApp`] is the top-level [`eframe::App`].  It holds:
//!
//! * `assistant`  — [`SharedAssistant`], written by the session controller
//!   and read here every frame.
//! * `store`      — [`SharedStore`], the settings record shared with the
//!   controller (orders arrive through it).
//! * `command_tx` — sends [`SessionCommand`] to the controller with
//!   `try_send`, so the UI thread never blocks.
//!
//! # Views
//!
//! | View | Content |
//! |------|---------|
//! | `Assistant` | Chat log, suggested questions, text input, call button, confirmed-order card |
//! | `Admin` | Login, then the orders tab (toggle / delete / print) and the settings tab |
//!
//! A header carries the view switch and the new-orders badge; a footer
//! shows the contact number.

use std::path::PathBuf;
use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::chat::{ChatMessage, Role};
use crate::invoice;
use crate::session::{SessionCommand, SessionState, SharedAssistant};
use crate::store::{Order, OrderStatus, Profile, SettingsStore, SharedStore};

/// Tappable prompts shown while the conversation is empty.
pub const SUGGESTED_QUESTIONS: [&str; 4] = [
    "كم سعر مولد الأكسجين 10 لتر؟",
    "عايز أطلب كرتونة جوانتي كشف",
    "شنو الأجهزة المتوفرة في فرع عطبرة؟",
    "أسعار حقن الأنسولين كم؟",
];

pub const LOGIN_FAILED: &str = "بيانات الدخول غير صحيحة";
pub const PROFILE_SAVED: &str = "تم حفظ التعديلات بنجاح";
const PROFILE_SAVE_FAILED: &str = "تعذر حفظ التعديلات";
const DELETE_PROMPT: &str = "هل أنت متأكد من حذف هذه الطلبية؟";

const PRIMARY: egui::Color32 = egui::Color32::from_rgb(30, 58, 138);
const SECONDARY: egui::Color32 = egui::Color32::from_rgb(4, 120, 87);
const MUTED: egui::Color32 = egui::Color32::from_rgb(110, 110, 110);
const WARNING: egui::Color32 = egui::Color32::from_rgb(217, 119, 6);
const DANGER: egui::Color32 = egui::Color32::from_rgb(200, 60, 60);

// ---------------------------------------------------------------------------
// Call button mapping
// ---------------------------------------------------------------------------

/// What pressing the call button does in `session`.  `None` while closing.
pub fn call_command(session: SessionState) -> Option<SessionCommand> {
    match session {
        SessionState::Idle => Some(SessionCommand::Open { initial_text: None }),
        SessionState::Connecting | SessionState::Active => Some(SessionCommand::Close),
        SessionState::Closing => None,
    }
}

fn call_button_text(session: SessionState) -> &'static str {
    match session {
        SessionState::Idle => "ابدأ المكالمة",
        SessionState::Connecting | SessionState::Active => "إنهاء المكالمة",
        SessionState::Closing => "...",
    }
}

fn call_hint(session: SessionState) -> &'static str {
    match session {
        SessionState::Idle => "اضغط لبدء المكالمة",
        SessionState::Connecting => "جاري الاتصال...",
        SessionState::Active => "المساعد يستمع...",
        SessionState::Closing => SessionState::Closing.label(),
    }
}

/// Hint under the call button.  While active it says whether the model is
/// replying or the mic is off.
fn assistant_hint(session: SessionState, capturing: bool, speaking: bool) -> &'static str {
    match session {
        SessionState::Active if speaking => "المساعد يتحدث...",
        SessionState::Active if !capturing => SessionState::Active.label(),
        other => call_hint(other),
    }
}

/// Number of suggestions in the row above the input once the chat has started.
const COMPACT_SUGGESTIONS: usize = 3;

/// The compact row shows once there is a conversation, until an order is confirmed.
fn shows_compact_suggestions(view: &AssistantView) -> bool {
    !view.messages.is_empty() && view.last_order.is_none()
}

// ---------------------------------------------------------------------------
// Admin panel state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminTab {
    Orders,
    Settings,
}

/// Row actions collected while the orders table is drawn and applied after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderAction {
    Toggle(String),
    RequestDelete(String),
    ConfirmDelete(String),
    CancelDelete,
    Print(String),
}

/// Per-visit dashboard state; dropped when the dashboard is closed.
#[derive(Debug)]
pub struct AdminPanel {
    pub logged_in: bool,
    pub user: String,
    pub pass: String,
    pub login_error: Option<String>,
    pub tab: AdminTab,
    /// Order awaiting the second delete click.
    pub pending_delete: Option<String>,
    /// Settings form; loaded from the store when the tab is first shown.
    pub draft: Option<Profile>,
    pub save_message: Option<String>,
}

impl Default for AdminPanel {
    fn default() -> Self {
        Self {
            logged_in: false,
            user: String::new(),
            pass: String::new(),
            login_error: None,
            tab: AdminTab::Orders,
            pending_delete: None,
            draft: None,
            save_message: None,
        }
    }
}

impl AdminPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the typed credentials.  Clears the password field either way.
    pub fn login(&mut self, store: &SettingsStore) -> bool {
        let ok = store.authenticate(&self.user, &self.pass);
        self.pass.clear();
        if ok {
            self.logged_in = true;
            self.login_error = None;
            log::info!("admin: operator logged in");
        } else {
            self.login_error = Some(LOGIN_FAILED.into());
            log::warn!("admin: rejected login for {:?}", self.user);
        }
        ok
    }

    /// Apply a row action.  Returns the order to print, if any.
    pub fn apply(&mut self, action: OrderAction, store: &mut SettingsStore) -> Option<Order> {
        match action {
            OrderAction::Toggle(id) => {
                if let Err(e) = store.toggle_status(&id) {
                    log::error!("admin: failed to persist status change for {id}: {e}");
                }
                None
            }
            OrderAction::RequestDelete(id) => {
                self.pending_delete = Some(id);
                None
            }
            OrderAction::ConfirmDelete(id) => {
                if self.pending_delete.as_deref() == Some(id.as_str()) {
                    if let Err(e) = store.delete_order(&id) {
                        log::error!("admin: failed to persist deletion of {id}: {e}");
                    }
                }
                self.pending_delete = None;
                None
            }
            OrderAction::CancelDelete => {
                self.pending_delete = None;
                None
            }
            OrderAction::Print(id) => store.orders().iter().find(|o| o.id == id).cloned(),
        }
    }

    /// Write the settings form through to the store.
    pub fn save_draft(&mut self, store: &mut SettingsStore) {
        let Some(draft) = self.draft.clone() else {
            return;
        };
        self.save_message = Some(match store.save_profile(draft) {
            Ok(()) => PROFILE_SAVED.into(),
            Err(e) => {
                log::error!("admin: failed to save settings: {e}");
                format!("{PROFILE_SAVE_FAILED}: {e}")
            }
        });
    }
}

// ---------------------------------------------------------------------------
// ZamzamiApp
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Assistant,
    Admin,
}

/// Snapshot of [`crate::session::AssistantState`] taken once per frame.
struct AssistantView {
    session: SessionState,
    messages: Vec<ChatMessage>,
    last_order: Option<Order>,
    notice: Option<String>,
    capturing: bool,
    speaking: bool,
}

/// eframe application — assistant and admin dashboard.
pub struct ZamzamiApp {
    assistant: SharedAssistant,
    store: SharedStore,
    command_tx: mpsc::Sender<SessionCommand>,
    invoice_dir: PathBuf,

    view: View,
    input: String,
    admin: AdminPanel,
}

impl ZamzamiApp {
    /// Create a new [`ZamzamiApp`].
    ///
    /// * `assistant`   — state shared with the session controller.
    /// * `store`       — settings/order store.
    /// * `command_tx`  — sender end of the session command channel.
    /// * `invoice_dir` — where printed invoices are written.
    pub fn new(
        assistant: SharedAssistant,
        store: SharedStore,
        command_tx: mpsc::Sender<SessionCommand>,
        invoice_dir: PathBuf,
    ) -> Self {
        Self {
            assistant,
            store,
            command_tx,
            invoice_dir,
            view: View::Assistant,
            input: String::new(),
            admin: AdminPanel::new(),
        }
    }

    fn send(&self, command: SessionCommand) {
        if let Err(e) = self.command_tx.try_send(command) {
            log::warn!("app: session command dropped: {e}");
        }
    }

    fn snapshot(&self) -> AssistantView {
        let st = self.assistant.lock().unwrap();
        AssistantView {
            session: st.session,
            messages: st.chat.messages().to_vec(),
            last_order: st.last_order.clone(),
            notice: st.notice.clone(),
            capturing: st.capturing,
            speaking: st.chat.model_turn_open(),
        }
    }

    fn submit_input(&mut self) {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return;
        }
        self.input.clear();
        self.send(SessionCommand::SendText(text));
    }

    // ── Header / footer ──────────────────────────────────────────────────

    fn draw_header(&mut self, ui: &mut egui::Ui, new_orders: usize) {
        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new("الزمزمي للمستهلكات الطبية")
                    .color(PRIMARY)
                    .strong()
                    .size(18.0),
            );
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let (label, target) = match self.view {
                    View::Assistant => ("لوحة التحكم", View::Admin),
                    View::Admin => ("الرئيسية", View::Assistant),
                };
                if ui.button(label).clicked() {
                    self.switch_view(target);
                }
                if self.view == View::Assistant && new_orders > 0 {
                    ui.label(
                        egui::RichText::new(format!(" {new_orders} "))
                            .color(egui::Color32::WHITE)
                            .background_color(DANGER)
                            .strong(),
                    );
                }
            });
        });
    }

    fn draw_footer(&self, ui: &mut egui::Ui, contact_number: &str) {
        ui.vertical_centered(|ui| {
            ui.label(
                egui::RichText::new("شكراً لثقتكم بشركة الزمزمي للمستهلكات الطبية")
                    .color(MUTED)
                    .size(11.0),
            );
            ui.label(
                egui::RichText::new(format!("تواصل معنا: {contact_number}"))
                    .color(PRIMARY)
                    .strong()
                    .size(11.0),
            );
        });
    }

    fn switch_view(&mut self, view: View) {
        if view == View::Assistant {
            self.admin = AdminPanel::new();
        }
        self.view = view;
    }

    // ── Assistant view ───────────────────────────────────────────────────

    fn draw_assistant(&mut self, ui: &mut egui::Ui, view: &AssistantView) {
        let controls_height = 180.0;
        let chat_height = (ui.available_height() - controls_height).max(120.0);

        egui::ScrollArea::vertical()
            .id_salt("chat")
            .max_height(chat_height)
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                if view.messages.is_empty() {
                    self.draw_welcome(ui);
                }
                for message in &view.messages {
                    draw_bubble(ui, message);
                }
                if let Some(order) = &view.last_order {
                    draw_order_card(ui, order);
                }
            });

        ui.separator();

        if let Some(notice) = &view.notice {
            ui.colored_label(WARNING, notice.as_str());
        }

        if shows_compact_suggestions(view) {
            ui.horizontal_wrapped(|ui| {
                for question in &SUGGESTED_QUESTIONS[..COMPACT_SUGGESTIONS] {
                    let chip = egui::Button::new(egui::RichText::new(*question).color(MUTED).size(11.0))
                        .corner_radius(egui::CornerRadius::same(12));
                    if ui.add(chip).clicked() {
                        self.send(SessionCommand::SendText(question.to_string()));
                    }
                }
            });
        }

        ui.horizontal(|ui| {
            let send = ui.add_enabled(
                view.session != SessionState::Closing,
                egui::Button::new(egui::RichText::new("إرسال").color(egui::Color32::WHITE))
                    .fill(PRIMARY),
            );
            let edit = ui.add(
                egui::TextEdit::singleline(&mut self.input)
                    .hint_text("اكتب استفسارك هنا...")
                    .desired_width(f32::INFINITY),
            );
            let entered = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if send.clicked() || entered {
                self.submit_input();
                edit.request_focus();
            }
        });

        ui.add_space(8.0);
        ui.vertical_centered(|ui| {
            let fill = if view.session.is_busy() { DANGER } else { SECONDARY };
            let button = egui::Button::new(
                egui::RichText::new(call_button_text(view.session))
                    .color(egui::Color32::WHITE)
                    .size(16.0),
            )
            .fill(fill)
            .min_size(egui::vec2(180.0, 40.0));

            if ui
                .add_enabled(view.session != SessionState::Closing, button)
                .clicked()
            {
                if let Some(command) = call_command(view.session) {
                    self.send(command);
                }
            }

            let hint = assistant_hint(view.session, view.capturing, view.speaking);
            ui.label(egui::RichText::new(hint).color(MUTED).size(12.0));
            if view.session == SessionState::Idle {
                ui.label(
                    egui::RichText::new("تحدث معنا بالعامية السودانية")
                        .color(MUTED)
                        .size(11.0),
                );
            }
        });
    }

    fn draw_welcome(&mut self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.vertical_centered(|ui| {
            ui.label(
                egui::RichText::new("مرحباً بك في الزمزمي")
                    .strong()
                    .size(20.0),
            );
            ui.label(
                egui::RichText::new(
                    "أنا مساعدك الذكي، يمكنني مساعدتك في معرفة الأسعار وتسجيل طلبيتك. \
                     اكتب استفسارك أو ابدأ مكالمة.",
                )
                .color(MUTED),
            );
            ui.add_space(12.0);
            for question in SUGGESTED_QUESTIONS {
                if ui.button(question).clicked() {
                    self.send(SessionCommand::SendText(question.to_string()));
                }
            }
        });
    }

    // ── Admin view ───────────────────────────────────────────────────────

    fn draw_admin(&mut self, ui: &mut egui::Ui) {
        if !self.admin.logged_in {
            self.draw_login(ui);
            return;
        }

        ui.horizontal(|ui| {
            ui.heading(egui::RichText::new("لوحة التحكم - الزمزمي").color(PRIMARY));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("إغلاق").clicked() {
                    self.switch_view(View::Assistant);
                }
            });
        });
        if self.view != View::Admin {
            return;
        }

        let new_orders = self.store.lock().unwrap().new_order_count();
        ui.horizontal(|ui| {
            let orders_label = if new_orders > 0 {
                format!("قائمة الطلبات ({new_orders})")
            } else {
                "قائمة الطلبات".to_string()
            };
            ui.selectable_value(&mut self.admin.tab, AdminTab::Orders, orders_label);
            ui.selectable_value(&mut self.admin.tab, AdminTab::Settings, "الإعدادات");
        });
        ui.separator();

        match self.admin.tab {
            AdminTab::Orders => self.draw_orders(ui),
            AdminTab::Settings => self.draw_settings(ui),
        }
    }

    fn draw_login(&mut self, ui: &mut egui::Ui) {
        ui.add_space(40.0);
        ui.vertical_centered(|ui| {
            ui.heading(egui::RichText::new("دخول الإدارة").color(PRIMARY));
            ui.add_space(12.0);
            ui.add(
                egui::TextEdit::singleline(&mut self.admin.user)
                    .hint_text("اسم المستخدم")
                    .desired_width(260.0),
            );
            let pass = ui.add(
                egui::TextEdit::singleline(&mut self.admin.pass)
                    .password(true)
                    .hint_text("كلمة المرور")
                    .desired_width(260.0),
            );
            let entered = pass.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

            if let Some(err) = &self.admin.login_error {
                ui.colored_label(DANGER, err.as_str());
            }

            ui.add_space(8.0);
            let clicked = ui
                .add(
                    egui::Button::new(egui::RichText::new("دخول").color(egui::Color32::WHITE))
                        .fill(PRIMARY)
                        .min_size(egui::vec2(120.0, 32.0)),
                )
                .clicked();
            if clicked || entered {
                let store = self.store.lock().unwrap();
                self.admin.login(&store);
            }
        });
    }

    fn draw_orders(&mut self, ui: &mut egui::Ui) {
        let orders: Vec<Order> = self.store.lock().unwrap().orders().to_vec();

        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("الطلبيات المستلمة").strong().size(16.0));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(
                    egui::RichText::new(format!("إجمالي الطلبات: {}", orders.len())).color(MUTED),
                );
            });
        });
        ui.add_space(6.0);

        if orders.is_empty() {
            ui.add_space(30.0);
            ui.vertical_centered(|ui| {
                ui.label(egui::RichText::new("لا توجد طلبيات مسجلة حتى الآن").color(MUTED));
            });
            return;
        }

        let mut actions = Vec::new();
        egui::ScrollArea::vertical()
            .id_salt("orders")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                egui::Grid::new("orders_grid")
                    .num_columns(6)
                    .striped(true)
                    .spacing([12.0, 8.0])
                    .show(ui, |ui| {
                        for header in ["العميل", "رقم الهاتف", "الفرع", "الطلبية", "الحالة", "الإجراءات"] {
                            ui.label(egui::RichText::new(header).strong());
                        }
                        ui.end_row();

                        for order in &orders {
                            self.draw_order_row(ui, order, &mut actions);
                            ui.end_row();
                        }
                    });
            });

        if actions.is_empty() {
            return;
        }
        let mut store = self.store.lock().unwrap();
        let contact = store.settings().contact_number.clone();
        for action in actions {
            if let Some(order) = self.admin.apply(action, &mut store) {
                spawn_print(order, contact.clone(), self.invoice_dir.clone());
            }
        }
    }

    fn draw_order_row(&self, ui: &mut egui::Ui, order: &Order, actions: &mut Vec<OrderAction>) {
        ui.vertical(|ui| {
            ui.label(egui::RichText::new(order.customer_name.as_str()).strong());
            ui.label(
                egui::RichText::new(format!("{} · {}", order.short_number(), order.timestamp))
                    .color(MUTED)
                    .size(10.0),
            );
        });
        ui.label(order.phone.as_str());
        ui.vertical(|ui| {
            ui.label(order.branch.as_str());
            ui.label(egui::RichText::new(order.address.as_str()).color(MUTED).size(10.0));
        });
        ui.label(order.items.as_str());

        let (color, label) = match order.status {
            OrderStatus::New => (WARNING, OrderStatus::New.label()),
            OrderStatus::Completed => (SECONDARY, OrderStatus::Completed.label()),
        };
        let status = egui::Button::new(egui::RichText::new(label).color(egui::Color32::WHITE))
            .fill(color);
        if ui.add(status).clicked() {
            actions.push(OrderAction::Toggle(order.id.clone()));
        }

        ui.horizontal(|ui| {
            if self.admin.pending_delete.as_deref() == Some(order.id.as_str()) {
                ui.colored_label(DANGER, DELETE_PROMPT);
                if ui.button("تأكيد").clicked() {
                    actions.push(OrderAction::ConfirmDelete(order.id.clone()));
                }
                if ui.button("إلغاء").clicked() {
                    actions.push(OrderAction::CancelDelete);
                }
            } else {
                if ui.button("طباعة").clicked() {
                    actions.push(OrderAction::Print(order.id.clone()));
                }
                if ui
                    .button(egui::RichText::new("حذف").color(DANGER))
                    .clicked()
                {
                    actions.push(OrderAction::RequestDelete(order.id.clone()));
                }
            }
        });
    }

    fn draw_settings(&mut self, ui: &mut egui::Ui) {
        if self.admin.draft.is_none() {
            let store = self.store.lock().unwrap();
            self.admin.draft = Some(Profile::from(store.settings()));
        }

        let mut save = false;
        egui::ScrollArea::vertical()
            .id_salt("settings")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                let Some(draft) = self.admin.draft.as_mut() else {
                    return;
                };

                ui.label(egui::RichText::new("اسم مستخدم جديد").strong());
                ui.text_edit_singleline(&mut draft.admin_user);
                ui.label(egui::RichText::new("كلمة مرور جديدة").strong());
                ui.add(egui::TextEdit::singleline(&mut draft.admin_pass).password(true));
                ui.add_space(6.0);

                ui.label(egui::RichText::new("رسالة الترحيب الافتراضية").strong());
                ui.add(
                    egui::TextEdit::multiline(&mut draft.welcome_message)
                        .desired_rows(2)
                        .desired_width(f32::INFINITY),
                );
                ui.label(egui::RichText::new("رقم التواصل (الواتساب/الهاتف)").strong());
                ui.text_edit_singleline(&mut draft.contact_number);
                ui.add_space(6.0);

                ui.label(egui::RichText::new("تعليمات الوكيل الذكي وقائمة الأسعار").strong());
                ui.add(
                    egui::TextEdit::multiline(&mut draft.system_instruction)
                        .desired_rows(14)
                        .desired_width(f32::INFINITY),
                );
                ui.add_space(10.0);

                save = ui
                    .add(
                        egui::Button::new(
                            egui::RichText::new("حفظ وتحديث النظام").color(egui::Color32::WHITE),
                        )
                        .fill(PRIMARY)
                        .min_size(egui::vec2(180.0, 34.0)),
                    )
                    .clicked();

                if let Some(message) = &self.admin.save_message {
                    let color = if message == PROFILE_SAVED { SECONDARY } else { DANGER };
                    ui.colored_label(color, message.as_str());
                }
            });

        if save {
            let mut store = self.store.lock().unwrap();
            self.admin.save_draft(&mut store);
        }
    }
}

// ---------------------------------------------------------------------------
// Free-standing widgets
// ---------------------------------------------------------------------------

fn draw_bubble(ui: &mut egui::Ui, message: &ChatMessage) {
    let (fill, text_color, align) = match message.role {
        Role::User => (PRIMARY, egui::Color32::WHITE, egui::Align::Max),
        Role::Model => (
            egui::Color32::from_rgb(243, 244, 246),
            egui::Color32::from_rgb(40, 40, 40),
            egui::Align::Min,
        ),
    };
    let max_width = ui.available_width() * 0.8;

    ui.with_layout(egui::Layout::top_down(align), |ui| {
        egui::Frame::new()
            .fill(fill)
            .corner_radius(egui::CornerRadius::same(10))
            .inner_margin(egui::Margin::same(8))
            .show(ui, |ui| {
                ui.set_max_width(max_width);
                ui.label(egui::RichText::new(message.text.as_str()).color(text_color));
                ui.label(
                    egui::RichText::new(message.created_at.format("%H:%M").to_string())
                        .color(text_color.gamma_multiply(0.6))
                        .size(9.0),
                );
            });
    });
    ui.add_space(4.0);
}

fn draw_order_card(ui: &mut egui::Ui, order: &Order) {
    ui.add_space(6.0);
    egui::Frame::new()
        .fill(egui::Color32::from_rgb(236, 253, 245))
        .stroke(egui::Stroke::new(2.0, egui::Color32::from_rgb(167, 243, 208)))
        .corner_radius(egui::CornerRadius::same(12))
        .inner_margin(egui::Margin::same(12))
        .show(ui, |ui| {
            ui.label(
                egui::RichText::new("تم استلام طلبك بنجاح")
                    .color(SECONDARY)
                    .strong()
                    .size(15.0),
            );
            ui.separator();
            ui.label(format!("الاسم: {}", order.customer_name));
            ui.label(format!("الهاتف: {}", order.phone));
            ui.label(format!("الفرع: {}", order.branch));
            ui.label(format!("الأصناف: {}", order.items));
            ui.add_space(4.0);
            ui.label(
                egui::RichText::new("سيتواصل معك فريقنا في أقرب وقت ممكن.")
                    .color(SECONDARY)
                    .size(10.0),
            );
        });
}

/// Render and open the invoice off the UI thread.
fn spawn_print(order: Order, contact_number: String, dir: PathBuf) {
    let spawned = std::thread::Builder::new()
        .name("invoice".into())
        .spawn(move || {
            if let Err(e) = invoice::print_invoice(&order, &contact_number, &dir) {
                log::error!("invoice: printing order {} failed: {e}", order.id);
            }
        });
    if let Err(e) = spawned {
        log::error!("invoice: failed to spawn print thread: {e}");
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for ZamzamiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let view = self.snapshot();
        let (new_orders, contact_number) = {
            let store = self.store.lock().unwrap();
            (store.new_order_count(), store.settings().contact_number.clone())
        };

        // The controller cannot wake egui, so poll while a session is live.
        if view.session.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        } else {
            ctx.request_repaint_after(Duration::from_secs(1));
        }

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(4.0);
            self.draw_header(ui, new_orders);
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("footer").show(ctx, |ui| {
            ui.add_space(2.0);
            self.draw_footer(ui, &contact_number);
            ui.add_space(2.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.view {
            View::Assistant => self.draw_assistant(ui, &view),
            View::Admin => self.draw_admin(ui),
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        let _ = self.command_tx.try_send(SessionCommand::Close);
        log::info!("Zamzami assistant closing");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewOrder, Settings};

    fn store_with_order() -> (tempfile::TempDir, SettingsStore, String) {
        let dir = tempfile::tempdir().unwrap();
        let mut store =
            SettingsStore::in_memory(dir.path().join("zamzami_settings.json"), Settings::default());
        let order = store
            .add_order(NewOrder {
                customer_name: "Ahmed".into(),
                phone: "0911111111".into(),
                address: "لم يحدد".into(),
                branch: "Khartoum".into(),
                items: "2x oxygen mask".into(),
            })
            .unwrap();
        (dir, store, order.id)
    }

    #[test]
    fn call_button_opens_when_idle_and_closes_when_busy() {
        assert_eq!(
            call_command(SessionState::Idle),
            Some(SessionCommand::Open { initial_text: None })
        );
        assert_eq!(call_command(SessionState::Connecting), Some(SessionCommand::Close));
        assert_eq!(call_command(SessionState::Active), Some(SessionCommand::Close));
        assert_eq!(call_command(SessionState::Closing), None);
    }

    #[test]
    fn login_with_default_credentials_succeeds() {
        let (_dir, store, _) = store_with_order();
        let mut panel = AdminPanel::new();
        panel.user = "admin".into();
        panel.pass = "admin123".into();
        assert!(panel.login(&store));
        assert!(panel.logged_in);
        assert!(panel.login_error.is_none());
        assert!(panel.pass.is_empty());
    }

    #[test]
    fn wrong_password_shows_inline_error() {
        let (_dir, store, _) = store_with_order();
        let mut panel = AdminPanel::new();
        panel.user = "admin".into();
        panel.pass = "Admin123".into();
        assert!(!panel.login(&store));
        assert!(!panel.logged_in);
        assert_eq!(panel.login_error.as_deref(), Some(LOGIN_FAILED));
    }

    #[test]
    fn delete_needs_confirmation() {
        let (_dir, mut store, id) = store_with_order();
        let mut panel = AdminPanel::new();

        // Confirming without a pending request does nothing.
        panel.apply(OrderAction::ConfirmDelete(id.clone()), &mut store);
        assert_eq!(store.orders().len(), 1);

        panel.apply(OrderAction::RequestDelete(id.clone()), &mut store);
        assert_eq!(panel.pending_delete.as_deref(), Some(id.as_str()));
        assert_eq!(store.orders().len(), 1);

        panel.apply(OrderAction::ConfirmDelete(id.clone()), &mut store);
        assert!(store.orders().is_empty());
        assert!(panel.pending_delete.is_none());
    }

    #[test]
    fn cancel_delete_keeps_order() {
        let (_dir, mut store, id) = store_with_order();
        let mut panel = AdminPanel::new();
        panel.apply(OrderAction::RequestDelete(id), &mut store);
        panel.apply(OrderAction::CancelDelete, &mut store);
        assert!(panel.pending_delete.is_none());
        assert_eq!(store.orders().len(), 1);
    }

    #[test]
    fn toggle_flips_status_and_print_returns_order() {
        let (_dir, mut store, id) = store_with_order();
        let mut panel = AdminPanel::new();

        assert!(panel.apply(OrderAction::Toggle(id.clone()), &mut store).is_none());
        assert_eq!(store.orders()[0].status, OrderStatus::Completed);
        assert_eq!(store.new_order_count(), 0);

        let printed = panel.apply(OrderAction::Print(id.clone()), &mut store);
        assert_eq!(printed.map(|o| o.id), Some(id));
        assert!(panel
            .apply(OrderAction::Print("missing".into()), &mut store)
            .is_none());
    }

    #[test]
    fn saving_draft_updates_profile_and_reports_success() {
        let (_dir, mut store, _) = store_with_order();
        let mut panel = AdminPanel::new();
        let mut draft = Profile::from(store.settings());
        draft.contact_number = "0999999999".into();
        panel.draft = Some(draft);

        panel.save_draft(&mut store);

        assert_eq!(panel.save_message.as_deref(), Some(PROFILE_SAVED));
        assert_eq!(store.settings().contact_number, "0999999999");
        assert_eq!(store.orders().len(), 1);
    }

    fn view_with(messages: Vec<ChatMessage>, last_order: Option<Order>) -> AssistantView {
        AssistantView {
            session: SessionState::Active,
            messages,
            last_order,
            notice: None,
            capturing: true,
            speaking: false,
        }
    }

    #[test]
    fn active_hint_follows_speech_and_microphone() {
        assert_eq!(
            assistant_hint(SessionState::Active, true, true),
            "المساعد يتحدث..."
        );
        assert_eq!(assistant_hint(SessionState::Active, true, false), "المساعد يستمع...");
        assert_eq!(
            assistant_hint(SessionState::Active, false, false),
            SessionState::Active.label()
        );
        assert_eq!(
            assistant_hint(SessionState::Idle, false, true),
            call_hint(SessionState::Idle)
        );
    }

    #[test]
    fn compact_suggestions_show_mid_conversation_until_an_order() {
        let mut log = crate::chat::ChatLog::new();
        assert!(!shows_compact_suggestions(&view_with(log.messages().to_vec(), None)));

        log.apply(crate::chat::ChatEvent::UserUtterance("مرحبا".into()));
        assert!(shows_compact_suggestions(&view_with(log.messages().to_vec(), None)));

        let (_dir, store, _) = store_with_order();
        let order = store.orders()[0].clone();
        assert!(!shows_compact_suggestions(&view_with(
            log.messages().to_vec(),
            Some(order)
        )));
    }
}
