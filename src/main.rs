mod actions;
mod bindings;
mod bridge;
mod cli;
mod config;
mod display;
mod engine;
mod frame;
mod gestures;
mod ipc;
mod keys;
mod logging;
mod window;

#[cfg(test)]
mod testing;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
