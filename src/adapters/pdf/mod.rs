pub mod helvetica;
pub mod renderer;

pub use helvetica::HelveticaMetrics;
pub use renderer::PrintPdfRenderer;
