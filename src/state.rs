use crate::services::extraction::BookingExtractor;
use crate::services::selection::ProviderSelector;

pub struct AppState {
    pub extractor: BookingExtractor,
    pub selector: ProviderSelector,
}
