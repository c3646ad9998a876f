//! Input/output channel contracts and output channel resolution.
mod input_channel;
mod output_channel;
mod output_channel_resolver;

pub use input_channel::{
    CallbackInputChannel, ChannelCandidate, ChannelConfig, ChannelKind, ChannelRegistry,
    ChannelsFile, InputChannel, RestInputChannel,
};
pub use output_channel::{
    BotMessage, CallbackOutputChannel, ChannelError, CollectingOutputChannel, OutputChannel,
    COLLECTING_CHANNEL_NAME,
};
pub use output_channel_resolver::{
    resolve_output_channel, ResolvedOutputChannel, LATEST_OUTPUT_CHANNEL,
    OUTPUT_CHANNEL_QUERY_KEY,
};
