//! Search request model: query, filters, sort, and pagination.
//!
//! Filters arrive in the wire form `{field, value, operator}` and fold into one
//! [`FilterCondition`] per field: `eq` replaces, `range` sets whichever of `min`/`max` its
//! object carries, `gte` sets `min`, `lte` sets `max`. Requests are assembled with
//! [`SearchRequestBuilder`] and are immutable afterwards.

// self
use crate::{_prelude::*, error::SearchError};

/// Condition applied to one field of the upstream `scope`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterCondition {
	/// Field must equal the value.
	Eq(JsonValue),
	/// Field must fall within the (inclusive) bounds.
	Range {
		/// Lower bound.
		#[serde(skip_serializing_if = "Option::is_none")]
		min: Option<JsonValue>,
		/// Upper bound.
		#[serde(skip_serializing_if = "Option::is_none")]
		max: Option<JsonValue>,
	},
}

/// Filter operator accepted in the wire form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
	/// Equality.
	#[default]
	Eq,
	/// `{min, max}` object.
	Range,
	/// Lower bound only.
	Gte,
	/// Upper bound only.
	Lte,
}

/// Filter in the wire form `{field, value, operator}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
	/// Field name.
	pub field: String,
	/// Value, or `{min, max}` for `range`.
	pub value: JsonValue,
	/// Operator (defaults to `eq`).
	#[serde(default)]
	pub operator: FilterOperator,
}
impl FilterSpec {
	/// Equality filter.
	pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
		Self { field: field.into(), value: value.into(), operator: FilterOperator::Eq }
	}
}

/// Filters as tool callers send them: a list of [`FilterSpec`] or a `{field: value}` object.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FilterInput {
	/// `[{field, value, operator}]`.
	List(Vec<FilterSpec>),
	/// `{field: value}`; an object holding only `min`/`max` keys is a range.
	Map(BTreeMap<String, JsonValue>),
}
impl FilterInput {
	/// Returns true when no filter is present.
	pub fn is_empty(&self) -> bool {
		match self {
			Self::List(specs) => specs.is_empty(),
			Self::Map(map) => map.is_empty(),
		}
	}

	/// Normalizes both shapes into wire-form specs.
	pub fn into_specs(self) -> Vec<FilterSpec> {
		match self {
			Self::List(specs) => specs,
			Self::Map(map) => map
				.into_iter()
				.map(|(field, value)| {
					let operator = if is_bounds_object(&value) {
						FilterOperator::Range
					} else {
						FilterOperator::Eq
					};

					FilterSpec { field, value, operator }
				})
				.collect(),
		}
	}
}

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
	/// Ascending.
	Asc,
	/// Descending.
	#[default]
	Desc,
}

/// How the upstream engine compares the sort field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKind {
	/// Numeric comparison.
	#[default]
	Number,
	/// Lexical comparison.
	Text,
	/// Chronological comparison.
	Date,
}

/// One sort key; earlier keys take precedence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
	/// Field name.
	pub field: String,
	/// Direction (defaults to `desc`).
	#[serde(default)]
	pub order: SortOrder,
	/// Comparison type (defaults to `number`).
	#[serde(default, rename = "type")]
	pub kind: SortKind,
}
impl SortSpec {
	/// Sort key with the given direction and the default numeric comparison.
	pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
		Self { field: field.into(), order, kind: SortKind::default() }
	}

	/// Overrides the comparison type.
	pub fn with_kind(mut self, kind: SortKind) -> Self {
		self.kind = kind;

		self
	}
}

/// Validated, immutable search request.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchRequest {
	query: String,
	filters: BTreeMap<String, FilterCondition>,
	sort: Vec<SortSpec>,
	page: u32,
	page_size: u32,
}
impl SearchRequest {
	/// Page size used when none is given.
	pub const DEFAULT_PAGE_SIZE: u32 = 20;

	/// Starts a builder for `query` (which may be empty).
	pub fn builder(query: impl Into<String>) -> SearchRequestBuilder {
		SearchRequestBuilder::new(query)
	}

	/// First page of `query` with the default page size and no filters.
	pub fn new(query: impl Into<String>) -> Self {
		Self {
			query: query.into(),
			filters: BTreeMap::new(),
			sort: Vec::new(),
			page: 1,
			page_size: Self::DEFAULT_PAGE_SIZE,
		}
	}

	/// Free-text query.
	pub fn query(&self) -> &str {
		&self.query
	}

	/// Filters keyed by field.
	pub fn filters(&self) -> &BTreeMap<String, FilterCondition> {
		&self.filters
	}

	/// Sort keys in precedence order.
	pub fn sort(&self) -> &[SortSpec] {
		&self.sort
	}

	/// 1-based page number.
	pub fn page(&self) -> u32 {
		self.page
	}

	/// Results per page.
	pub fn page_size(&self) -> u32 {
		self.page_size
	}

	/// 0-based offset of the first result.
	pub fn start(&self) -> u64 {
		u64::from(self.page - 1) * u64::from(self.page_size)
	}
}

/// Builder for [`SearchRequest`]; the first invalid input is reported by [`Self::build`].
#[derive(Clone, Debug)]
pub struct SearchRequestBuilder {
	request: SearchRequest,
	error: Option<SearchError>,
}
impl SearchRequestBuilder {
	fn new(query: impl Into<String>) -> Self {
		Self { request: SearchRequest::new(query), error: None }
	}

	/// Adds an equality filter, replacing any earlier condition on `field`.
	pub fn filter_eq(self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
		self.filter(FilterSpec::eq(field, value))
	}

	/// Adds range bounds on `field`, merging with earlier bounds.
	pub fn filter_range(
		self,
		field: impl Into<String>,
		min: Option<JsonValue>,
		max: Option<JsonValue>,
	) -> Self {
		let mut bounds = serde_json::Map::new();

		if let Some(min) = min {
			bounds.insert("min".into(), min);
		}
		if let Some(max) = max {
			bounds.insert("max".into(), max);
		}

		self.filter(FilterSpec {
			field: field.into(),
			value: JsonValue::Object(bounds),
			operator: FilterOperator::Range,
		})
	}

	/// Folds a wire-form filter into the request.
	pub fn filter(mut self, spec: FilterSpec) -> Self {
		if self.error.is_none() {
			self.error = fold_filter(&mut self.request.filters, spec).err();
		}

		self
	}

	/// Folds every filter in order.
	pub fn filters(self, specs: impl IntoIterator<Item = FilterSpec>) -> Self {
		specs.into_iter().fold(self, Self::filter)
	}

	/// Appends a sort key.
	pub fn sort(mut self, spec: SortSpec) -> Self {
		if self.error.is_none() && spec.field.trim().is_empty() {
			self.error = Some(invalid("sort field names cannot be empty"));
		}

		self.request.sort.push(spec);

		self
	}

	/// Appends every sort key in order.
	pub fn sorts(self, specs: impl IntoIterator<Item = SortSpec>) -> Self {
		specs.into_iter().fold(self, Self::sort)
	}

	/// Sets the 1-based page.
	pub fn page(mut self, page: u32) -> Self {
		self.request.page = page;

		self
	}

	/// Sets the page size.
	pub fn page_size(mut self, page_size: u32) -> Self {
		self.request.page_size = page_size;

		self
	}

	/// Sets pagination from a 0-based offset; offsets inside a page resolve to that page.
	pub fn offset(mut self, start: u64, size: u32) -> Self {
		self.request.page_size = size;

		if size > 0 {
			match u32::try_from(start / u64::from(size)) {
				Ok(index) if index < u32::MAX => self.request.page = index + 1,
				_ if self.error.is_none() =>
					self.error = Some(invalid("start offset is out of range")),
				_ => (),
			}
		}

		self
	}

	/// Validates and returns the request.
	pub fn build(self) -> Result<SearchRequest, SearchError> {
		if let Some(e) = self.error {
			return Err(e);
		}
		if self.request.page == 0 {
			return Err(invalid("page must be at least 1"));
		}
		if self.request.page_size == 0 {
			return Err(invalid("page_size must be at least 1"));
		}

		Ok(self.request)
	}
}

fn fold_filter(
	filters: &mut BTreeMap<String, FilterCondition>,
	spec: FilterSpec,
) -> Result<(), SearchError> {
	let field = spec.field.trim();

	if field.is_empty() {
		return Err(invalid("filter field names cannot be empty"));
	}

	let (min, max) = match spec.operator {
		FilterOperator::Eq => {
			filters.insert(field.to_owned(), FilterCondition::Eq(spec.value));

			return Ok(());
		},
		FilterOperator::Range => {
			let JsonValue::Object(mut bounds) = spec.value else {
				return Err(invalid(&format!("range filter on `{field}` needs a {{min, max}} object")));
			};
			let (min, max) = (bounds.remove("min"), bounds.remove("max"));

			if min.is_none() && max.is_none() {
				return Err(invalid(&format!("range filter on `{field}` has neither min nor max")));
			}

			(min, max)
		},
		FilterOperator::Gte => (Some(spec.value), None),
		FilterOperator::Lte => (None, Some(spec.value)),
	};
	let slot = filters
		.entry(field.to_owned())
		.or_insert(FilterCondition::Range { min: None, max: None });

	if matches!(slot, FilterCondition::Eq(_)) {
		*slot = FilterCondition::Range { min: None, max: None };
	}
	if let FilterCondition::Range { min: slot_min, max: slot_max } = slot {
		if min.is_some() {
			*slot_min = min;
		}
		if max.is_some() {
			*slot_max = max;
		}
	}

	Ok(())
}

fn is_bounds_object(value: &JsonValue) -> bool {
	value.as_object().is_some_and(|map| {
		!map.is_empty() && map.keys().all(|key| key == "min" || key == "max")
	})
}

fn invalid(reason: &str) -> SearchError {
	SearchError::InvalidRequest { reason: reason.to_owned() }
}
