pub mod paper_loader;

pub use paper_loader::load_paper_template;
