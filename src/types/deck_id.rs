// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt::Display;
use std::fmt::Formatter;

use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use uuid::Uuid;

use crate::error::ErrorReport;
use crate::error::Fallible;

/// Opaque deck identifier, generated at creation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DeckId {
    inner: Uuid,
}

impl DeckId {
    pub fn fresh() -> Self {
        Self {
            inner: Uuid::new_v4(),
        }
    }

    pub fn parse(s: &str) -> Fallible<Self> {
        let inner =
            Uuid::parse_str(s).map_err(|_| ErrorReport::new("invalid deck identifier."))?;
        Ok(Self { inner })
    }
}

impl Display for DeckId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl ToSql for DeckId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for DeckId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        DeckId::parse(&string).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() -> Fallible<()> {
        let id = DeckId::fresh();
        let parsed = DeckId::parse(&id.to_string())?;
        assert_eq!(id, parsed);
        Ok(())
    }
}
