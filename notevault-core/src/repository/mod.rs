pub mod files;
pub mod shares;

pub use files::FileRepository;
pub use shares::ShareRepository;
