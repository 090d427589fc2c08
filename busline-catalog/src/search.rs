use busline_core::places::PlaceRegistry;
use busline_core::repository::ScheduleRepository;
use busline_core::search::{ScheduleSearchRequest, ScheduleSummary};
use busline_core::{Clock, CoreError, CoreResult};
use std::sync::Arc;

pub struct ScheduleSearchService {
    schedules: Arc<dyn ScheduleRepository>,
    places: Arc<dyn PlaceRegistry>,
    clock: Arc<dyn Clock>,
}

impl ScheduleSearchService {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        places: Arc<dyn PlaceRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { schedules, places, clock }
    }

    /// Schedules from `source` to `destination` on the requested date, filtered
    /// and sorted by the request's filters.
    #[tracing::instrument(skip(self, request), fields(source = %request.source, destination = %request.destination, date = %request.travel_date))]
    pub async fn search(&self, request: &ScheduleSearchRequest) -> CoreResult<Vec<ScheduleSummary>> {
        let source = request.source.trim();
        let destination = request.destination.trim();

        if source.is_empty() || destination.is_empty() {
            return Err(CoreError::ValidationError("source and destination are required".to_string()));
        }
        if source.eq_ignore_ascii_case(destination) {
            return Err(CoreError::ValidationError("source and destination must differ".to_string()));
        }
        if request.travel_date < self.clock.today() {
            return Err(CoreError::ValidationError(format!(
                "travel date {} is in the past",
                request.travel_date
            )));
        }
        request.filters.validate()?;

        for place in [source, destination] {
            if !self.places.place_exists(place).await? {
                return Err(CoreError::ValidationError(format!("unknown place '{}'", place)));
            }
        }

        let found = self
            .schedules
            .find_schedules(source, destination, request.travel_date)
            .await?;
        let results = request.filters.apply(found);
        tracing::debug!("Search matched {} schedules", results.len());
        Ok(results)
    }
}
