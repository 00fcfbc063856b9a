/// Pipeline for processing bid requests through the auction. The
/// intake handlers (openrtb, slots, vast) all feed this one pipeline.
pub mod auction;
