//! The bootstrap phase machine (§4.10): a single-threaded, stateful
//! sequence of named phases, each reporting progress through a callback.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Initializing,
    FindingSnapshot,
    DownloadingSnapshot,
    ExtractingSnapshot,
    LoadingAccounts,
    LoadingTower,
    InitializingBank,
    InitializingReplay,
    ConnectingGossip,
    Ready,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Initializing => "Initializing",
            Phase::FindingSnapshot => "FindingSnapshot",
            Phase::DownloadingSnapshot => "DownloadingSnapshot",
            Phase::ExtractingSnapshot => "ExtractingSnapshot",
            Phase::LoadingAccounts => "LoadingAccounts",
            Phase::LoadingTower => "LoadingTower",
            Phase::InitializingBank => "InitializingBank",
            Phase::InitializingReplay => "InitializingReplay",
            Phase::ConnectingGossip => "ConnectingGossip",
            Phase::Ready => "Ready",
        }
    }
}

/// Progress callback invoked on every phase transition.
pub type ProgressCallback<'a> = Box<dyn FnMut(Phase) + 'a>;
