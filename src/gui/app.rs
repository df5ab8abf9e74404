use eframe::egui;
use rfd::FileDialog;
use std::sync::Arc;
use stylegan_panel::events::Notifier;
use stylegan_panel::frames::frame_file_name;
use stylegan_panel::{
    GeneratorPaths, InputEnablement, ModelId, RunConfig, RunController, RunFlag, RunPhase,
    RunUpdate, Settings,
};
use tokio::runtime::Handle;

pub struct PanelApp {
    controller: RunController,
    config: RunConfig,
    status_message: String,
    dialog: Option<String>,
    texture: Option<egui::TextureHandle>,
    shown_revision: u64,
    seek_position: u32,
}

impl PanelApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        runtime: Handle,
        paths: GeneratorPaths,
        settings: Settings,
        startup_error: Option<String>,
    ) -> Self {
        let ctx = cc.egui_ctx.clone();
        let notify: Notifier = Arc::new(move || ctx.request_repaint());
        let config = settings.last_run.clone();

        Self {
            controller: RunController::new(runtime, paths, settings, Some(notify)),
            config,
            status_message: "Ready".to_string(),
            dialog: startup_error,
            texture: None,
            shown_revision: 0,
            seek_position: 0,
        }
    }
}

impl eframe::App for PanelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        for update in self.controller.pump() {
            self.apply_update(update);
        }

        if self.controller.display_revision() != self.shown_revision {
            self.upload_current_frame(ctx);
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("StyleGAN Panel");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(&self.status_message);
                });
            });
        });

        egui::TopBottomPanel::bottom("sequence").show(ctx, |ui| {
            self.show_sequence_bar(ui);
        });

        egui::SidePanel::left("parameters").show(ctx, |ui| {
            self.show_parameters_panel(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_image(ui);
        });

        self.show_dialog(ctx);

        if self.controller.snapshot().phase != RunPhase::Idle {
            ctx.request_repaint_after(self.controller.settings().poll_interval());
        }
    }
}

impl PanelApp {
    fn apply_update(&mut self, update: RunUpdate) {
        match update {
            RunUpdate::FrameShown(index) => {
                self.status_message = format!("Showing {}", frame_file_name(index));
            }
            RunUpdate::Progress { index, total } => {
                self.status_message = format!("Generated {} of {}", index, total);
            }
            RunUpdate::ProcessExited { code } => {
                log::info!("Generator exited with {:?}", code);
                self.dialog = Some("Generation finished.".to_string());
            }
            RunUpdate::Completed => {
                self.status_message = "All frames received".to_string();
            }
            RunUpdate::AssemblyDone(report) => {
                let mut message = format!(
                    "Saved {} frames to {}",
                    report.frames.len(),
                    report.path.display()
                );
                if !report.skipped.is_empty() {
                    message.push_str(&format!("\nSkipped unreadable frames: {:?}", report.skipped));
                }
                self.dialog = Some(message);
            }
            RunUpdate::AssemblyFailed(error) => {
                self.dialog = Some(error);
            }
            RunUpdate::Refresh => {}
        }
    }

    fn upload_current_frame(&mut self, ctx: &egui::Context) {
        self.shown_revision = self.controller.display_revision();
        if let Some(frame) = self.controller.current_frame() {
            let color_image = egui::ColorImage::from_rgba_unmultiplied(
                [frame.image.width() as usize, frame.image.height() as usize],
                frame.image.as_raw(),
            );
            match &mut self.texture {
                Some(texture) => texture.set(color_image, egui::TextureOptions::LINEAR),
                None => {
                    self.texture =
                        Some(ctx.load_texture("current_frame", color_image, egui::TextureOptions::LINEAR));
                }
            }
        }
    }

    fn show_parameters_panel(&mut self, ui: &mut egui::Ui) {
        let enabled = InputEnablement::for_config(&self.config);
        let running = self.controller.snapshot().is_running;

        ui.heading("Generation");
        ui.separator();

        ui.add_enabled_ui(enabled.seed, |ui| {
            ui.horizontal(|ui| {
                ui.label("Seed");
                ui.add(egui::DragValue::new(&mut self.config.seed_start));
            });
        });
        ui.add_enabled_ui(enabled.seed2, |ui| {
            ui.horizontal(|ui| {
                ui.label("Seed 2");
                ui.add(egui::DragValue::new(&mut self.config.seed_end));
            });
        });
        ui.horizontal(|ui| {
            ui.label("Frames");
            ui.add(egui::DragValue::new(&mut self.config.count).range(0..=99_999));
        });
        ui.horizontal(|ui| {
            ui.label("Start index");
            ui.add(egui::DragValue::new(&mut self.config.start_index).range(0..=99_999));
        });

        ui.separator();
        self.flag_checkbox(ui, enabled.random_seed, RunFlag::RandomSeed, "Random seed");
        self.flag_checkbox(ui, enabled.smooth_z, RunFlag::SmoothZ, "Smooth z");
        self.flag_checkbox(ui, enabled.smooth_psi, RunFlag::SmoothPsi, "Smooth psi");

        ui.separator();
        egui::ComboBox::from_label("Model")
            .selected_text(self.config.model.label())
            .show_ui(ui, |ui| {
                for model in ModelId::ALL {
                    ui.selectable_value(&mut self.config.model, model, model.label());
                }
            });

        ui.collapsing("Advanced", |ui| {
            let mut use_psi = self.config.psi.is_some();
            if ui.checkbox(&mut use_psi, "Truncation psi").changed() {
                self.config.psi = if use_psi { Some(0.7) } else { None };
            }
            if let Some(psi) = self.config.psi.as_mut() {
                ui.add(egui::Slider::new(psi, -1.0..=1.5));
            }

            let mut use_layers = self.config.layers.is_some();
            if ui.checkbox(&mut use_layers, "Layer count").changed() {
                self.config.layers = if use_layers { Some(18) } else { None };
            }
            if let Some(layers) = self.config.layers.as_mut() {
                ui.add(egui::DragValue::new(layers).range(1..=18));
            }

            ui.checkbox(&mut self.config.sequential_seeds, "Seeds 1..N");
        });

        ui.separator();
        if ui
            .add_enabled(!running, egui::Button::new("▶ Generate"))
            .clicked()
        {
            self.start_run();
        }

        if ui.button("📁 Locate generator").clicked() {
            self.locate_generator();
        }

        ui.separator();
        let paths = self.controller.paths();
        if paths.is_configured() {
            ui.label("Generator:");
            ui.label(paths.install_dir.to_string_lossy());
        } else {
            ui.label("Generator path not set");
        }
    }

    fn flag_checkbox(&mut self, ui: &mut egui::Ui, enabled: bool, flag: RunFlag, label: &str) {
        let mut checked = self.config.flag(flag);
        if ui
            .add_enabled(enabled, egui::Checkbox::new(&mut checked, label))
            .changed()
        {
            self.config.set_flag(flag, checked);
        }
    }

    fn show_sequence_bar(&mut self, ui: &mut egui::Ui) {
        let snapshot = self.controller.snapshot();
        let sequence_enabled = InputEnablement::for_config(&self.config).sequence_controls;

        ui.horizontal(|ui| {
            ui.add_enabled(
                sequence_enabled,
                egui::ProgressBar::new(snapshot.progress())
                    .desired_width(240.0)
                    .text(format!(
                        "{}/{}",
                        snapshot.next_expected_index, snapshot.total_expected
                    )),
            );

            let max = self.controller.seek_limit();
            self.seek_position = self.seek_position.min(max);
            let slider = ui.add_enabled(
                sequence_enabled,
                egui::Slider::new(&mut self.seek_position, 0..=max).text("Frame"),
            );
            if slider.changed() {
                self.controller.seek(self.seek_position);
            }

            let can_save = sequence_enabled && !self.controller.is_assembling();
            if ui
                .add_enabled(can_save, egui::Button::new("💾 Save animation"))
                .clicked()
            {
                self.save_animation();
            }
            if self.controller.is_assembling() {
                ui.spinner();
            }
        });
    }

    fn show_image(&mut self, ui: &mut egui::Ui) {
        match &self.texture {
            Some(texture) => {
                let available = ui.available_size();
                let size = texture.size_vec2();
                let scale = (available.x / size.x).min(available.y / size.y).min(1.0);
                ui.centered_and_justified(|ui| {
                    ui.image((texture.id(), size * scale));
                });
            }
            None => {
                ui.centered_and_justified(|ui| {
                    ui.label("No frame yet. Press Generate to start.");
                });
            }
        }
    }

    fn show_dialog(&mut self, ctx: &egui::Context) {
        let mut close = false;
        if let Some(message) = &self.dialog {
            egui::Window::new("Message")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(message);
                    if ui.button("OK").clicked() {
                        close = true;
                    }
                });
        }
        if close {
            self.dialog = None;
        }
    }

    fn start_run(&mut self) {
        match self.controller.start_run(&self.config) {
            Ok(outcome) => {
                if let Some(warning) = outcome.built.warning {
                    self.config.count = outcome.built.count;
                    self.dialog = Some(warning.to_string());
                }
                self.seek_position = 0;
                self.status_message = format!("Generating {} frames", outcome.built.count);

                let settings = self.controller.settings_mut();
                settings.last_run = self.config.clone();
                if let Err(e) = settings.save() {
                    log::warn!("Could not save settings: {}", e);
                }
            }
            Err(e) => {
                self.dialog = Some(e.to_string());
            }
        }
    }

    fn locate_generator(&mut self) {
        if let Some(dir) = FileDialog::new().pick_folder() {
            let stem = self.controller.settings().executable_stem.clone();
            self.status_message = format!("Generator set to {}", dir.display());
            self.controller.set_paths(GeneratorPaths::new(dir, stem));
        }
    }

    fn save_animation(&mut self) {
        let default_name = self.controller.settings().animation_file.clone();
        let picked = FileDialog::new()
            .set_directory(self.controller.working_dir())
            .set_file_name(default_name)
            .add_filter("GIF animation", &["gif"])
            .save_file();

        if let Some(path) = picked {
            let total = self.controller.assembly_total(self.config.count);
            self.status_message = format!("Saving {}", path.display());
            self.controller.assemble_in_background(total, path);
        }
    }
}
