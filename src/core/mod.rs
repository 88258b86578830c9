pub mod backend;
pub mod completion;
pub mod events;
pub mod function_call;
pub mod persistence;
pub mod realtime;
pub mod session;
pub mod transcript;

// Re-export commonly used types for convenience
pub use backend::{
    ConversationBackend, ConversationMessage, HttpBackend, RequestSlot, SummaryResponse,
};

pub use completion::{CompletionSignal, TeardownTrigger};

pub use events::{CallEnvelope, EventNormalizer, FunctionCallInvocation, InboundEvent};

pub use function_call::{
    Dispatch, FunctionCallCoordinator, FunctionCallOutcome, FunctionCallResult, SessionAction,
};

pub use persistence::{PersistenceRelay, RelayOutcome, RelayStats};

pub use realtime::{
    ConnectionState, DataChannel, MediaCapture, MicrophoneStream, OpenAISignaling,
    RealtimeError, RealtimeResult, RealtimeSignaling, RealtimeTransport, TranscriptRole,
    TransportEvent, TransportEventCallback, TransportFactory,
};

pub use session::{
    ClientUi, ControlState, SessionCommand, SessionDeps, SessionHandle, SessionInput, SessionManager,
    StatusKind, StatusUpdate, StopReason,
};

pub use transcript::{FinalizeOutcome, TranscriptBuffer};
