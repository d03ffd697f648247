use handsign::{app::App, config::Config, gui};

fn main() -> anyhow::Result<()> {
    handsign::init_logger!();

    let config = Config::load()?;
    let app = App::new(config)?;

    gui::run(move || app.run())
}
