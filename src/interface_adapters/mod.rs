// Interface adapters: wire protocol, network handling and presenters.

pub mod http;
pub mod net;
pub mod presenters;
pub mod protocol;
pub mod state;
