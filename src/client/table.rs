//! Multi-column table walking.
//!
//! Reconstructs rows from column-major storage: one cursor per requested
//! column, one multi-binding GETNEXT round per row, and every emitted row
//! carries exactly one value per column with a matching row-index suffix.
//! Equal column counts per row is a hard invariant; a table that
//! desynchronizes beyond repair fails with
//! [`Error::InconsistentTableWalk`] instead of returning misaligned rows.

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::transport::Transport;
use crate::value::Value;

use super::Client;

fn render_index(arcs: &[u32]) -> Box<str> {
    arcs.iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(".")
        .into()
}

fn inconsistent(column: &Oid, expected: &[u32], actual: &str) -> Error {
    Error::InconsistentTableWalk {
        column: column.clone(),
        expected: render_index(expected),
        actual: actual.into(),
    }
}

impl<T: Transport> Client<T> {
    /// Walk a table by its column OIDs, returning one `Vec<Value>` per row in
    /// increasing row-index order.
    ///
    /// Each round issues a single GETNEXT covering every live cursor. A
    /// column whose answer leaves its subtree or carries an exception
    /// sentinel is exhausted; a well-formed table exhausts all columns in the
    /// same round. When a round's row suffixes disagree (sparse tables,
    /// concurrent row deletion), lagging columns are advanced toward the
    /// maximum suffix seen; a column that overshoots or runs out mid-row
    /// fails the walk.
    pub async fn walk_columns(&self, columns: &[Oid]) -> Result<Vec<Vec<Value>>> {
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        let mut cursors: Vec<Oid> = columns.to_vec();
        let mut exhausted = vec![false; columns.len()];
        let mut rows: Vec<Vec<Value>> = Vec::new();

        loop {
            let active: Vec<usize> = (0..columns.len()).filter(|c| !exhausted[*c]).collect();
            if active.is_empty() {
                break;
            }

            let request: Vec<Oid> = active.iter().map(|c| cursors[*c].clone()).collect();
            let varbinds = self.get_next_many(&request).await?;

            // One (column, row-suffix, value) per column still in the table.
            let mut round: Vec<(usize, Vec<u32>, Value)> = Vec::new();
            let mut ended_this_round = false;
            for (&col, vb) in active.iter().zip(varbinds) {
                match vb.oid.suffix(&columns[col]) {
                    Some(suffix) if !vb.value.is_exception() => {
                        if vb.oid <= cursors[col] {
                            return Err(Error::NonIncreasingOid {
                                previous: cursors[col].clone(),
                                current: vb.oid.clone(),
                            });
                        }
                        let suffix = suffix.to_vec();
                        cursors[col] = vb.oid;
                        round.push((col, suffix, vb.value));
                    }
                    _ => {
                        exhausted[col] = true;
                        ended_this_round = true;
                    }
                }
            }

            if round.is_empty() {
                // All remaining columns ended together: clean table end.
                break;
            }
            if ended_this_round {
                // Some columns ran out while others still hold rows, so the
                // next row could not have a cell for every column.
                let (short_col, _) = exhausted
                    .iter()
                    .enumerate()
                    .find(|(_, e)| **e)
                    .expect("a column was exhausted this round");
                let target = round
                    .iter()
                    .map(|(_, s, _)| s.as_slice())
                    .max()
                    .expect("round is non-empty");
                return Err(inconsistent(&columns[short_col], target, "(exhausted)"));
            }

            // Align the round on the largest row suffix seen.
            let target: Vec<u32> = round
                .iter()
                .map(|(_, s, _)| s.clone())
                .max()
                .expect("round is non-empty");

            let mut cells: Vec<Option<Value>> = vec![None; columns.len()];
            for (col, mut suffix, mut value) in round {
                while suffix[..] < target[..] {
                    tracing::debug!(
                        snmp.column = %columns[col],
                        snmp.row = %render_index(&suffix),
                        snmp.target_row = %render_index(&target),
                        "column lagging, advancing cursor"
                    );
                    let vb = self.get_next(&cursors[col]).await?;
                    match vb.oid.suffix(&columns[col]) {
                        Some(s) if !vb.value.is_exception() => {
                            if vb.oid <= cursors[col] {
                                return Err(Error::NonIncreasingOid {
                                    previous: cursors[col].clone(),
                                    current: vb.oid.clone(),
                                });
                            }
                            suffix = s.to_vec();
                            cursors[col] = vb.oid;
                            value = vb.value;
                        }
                        _ => return Err(inconsistent(&columns[col], &target, "(exhausted)")),
                    }
                }
                if suffix != target {
                    return Err(inconsistent(
                        &columns[col],
                        &target,
                        &render_index(&suffix),
                    ));
                }
                cells[col] = Some(value);
            }

            rows.push(
                cells
                    .into_iter()
                    .map(|c| c.expect("every live column produced a cell"))
                    .collect(),
            );
        }

        Ok(rows)
    }

    /// [`walk_columns`](Client::walk_columns) with every cell rendered
    /// canonically.
    pub async fn get_table_as_strings(&self, columns: &[Oid]) -> Result<Vec<Vec<String>>> {
        let rows = self.walk_columns(columns).await?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.to_string()).collect())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use crate::oid;
    use crate::transport::{MockTransport, ResponseBuilder};

    fn mock_client(mock: MockTransport) -> Client<MockTransport> {
        let config = ClientConfig {
            retries: 0,
            ..ClientConfig::default()
        };
        Client::new(mock, config)
    }

    fn columns() -> Vec<Oid> {
        vec![
            oid!(1, 3, 6, 1, 99, 1, 2),
            oid!(1, 3, 6, 1, 99, 1, 6),
        ]
    }

    #[tokio::test]
    async fn test_walk_columns_stitches_rows() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        // Round 1: row 1 of both columns.
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 2, 1), Value::from("loopback"))
                .varbind(oid!(1, 3, 6, 1, 99, 1, 6, 1), Value::from("00:00:00:00:01"))
                .build(b"public"),
        );
        // Round 2: row 2.
        mock.queue_response(
            ResponseBuilder::new(2)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 2, 2), Value::from("eth0"))
                .varbind(oid!(1, 3, 6, 1, 99, 1, 6, 2), Value::from("00:00:00:00:02"))
                .build(b"public"),
        );
        // Round 3: both columns leave the table.
        mock.queue_response(
            ResponseBuilder::new(3)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 7, 1), Value::Integer(0))
                .varbind(oid!(1, 3, 6, 1, 99, 2), Value::EndOfMibView)
                .build(b"public"),
        );

        let rows = mock_client(mock).walk_columns(&columns()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![Value::from("loopback"), Value::from("00:00:00:00:01")]);
        assert_eq!(rows[1], vec![Value::from("eth0"), Value::from("00:00:00:00:02")]);
    }

    #[tokio::test]
    async fn test_walk_columns_realigns_lagging_column() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        // Column 1 skips row 2; column 2 still has it: first round returns
        // row 1 for both, second round returns (row 3, row 2).
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 2, 1), Value::from("a1"))
                .varbind(oid!(1, 3, 6, 1, 99, 1, 6, 1), Value::from("b1"))
                .build(b"public"),
        );
        mock.queue_response(
            ResponseBuilder::new(2)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 2, 3), Value::from("a3"))
                .varbind(oid!(1, 3, 6, 1, 99, 1, 6, 2), Value::from("b2"))
                .build(b"public"),
        );
        // Re-alignment GETNEXT for the lagging column reaches row 3.
        mock.queue_response(
            ResponseBuilder::new(3)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 6, 3), Value::from("b3"))
                .build(b"public"),
        );
        // Final round: table end.
        mock.queue_response(
            ResponseBuilder::new(4)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 2, 3), Value::EndOfMibView)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 6, 3), Value::EndOfMibView)
                .build(b"public"),
        );

        let rows = mock_client(mock).walk_columns(&columns()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![Value::from("a1"), Value::from("b1")]);
        assert_eq!(rows[1], vec![Value::from("a3"), Value::from("b3")]);
    }

    #[tokio::test]
    async fn test_walk_columns_fails_when_column_overshoots() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 2, 3), Value::from("a3"))
                .varbind(oid!(1, 3, 6, 1, 99, 1, 6, 1), Value::from("b1"))
                .build(b"public"),
        );
        // Lagging column jumps over the target row.
        mock.queue_response(
            ResponseBuilder::new(2)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 6, 5), Value::from("b5"))
                .build(b"public"),
        );

        let err = mock_client(mock).walk_columns(&columns()).await.unwrap_err();
        assert!(matches!(err, Error::InconsistentTableWalk { .. }));
    }

    #[tokio::test]
    async fn test_walk_columns_fails_on_uneven_column_lengths() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 2, 1), Value::from("a1"))
                .varbind(oid!(1, 3, 6, 1, 99, 1, 6, 1), Value::from("b1"))
                .build(b"public"),
        );
        // Column 2 ends while column 1 still has a row.
        mock.queue_response(
            ResponseBuilder::new(2)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 2, 2), Value::from("a2"))
                .varbind(oid!(1, 3, 6, 1, 99, 1, 6, 1), Value::EndOfMibView)
                .build(b"public"),
        );

        let err = mock_client(mock).walk_columns(&columns()).await.unwrap_err();
        assert!(matches!(err, Error::InconsistentTableWalk { .. }));
    }

    #[tokio::test]
    async fn test_walk_columns_empty_table() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 2), Value::EndOfMibView)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 6), Value::EndOfMibView)
                .build(b"public"),
        );

        let rows = mock_client(mock).walk_columns(&columns()).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_walk_columns_no_columns() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        let rows = mock_client(mock).walk_columns(&[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_get_table_as_strings_renders_cells() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 2, 1), Value::from("eth0"))
                .varbind(oid!(1, 3, 6, 1, 99, 1, 6, 1), Value::Integer(1500))
                .build(b"public"),
        );
        mock.queue_response(
            ResponseBuilder::new(2)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 2, 1), Value::EndOfMibView)
                .varbind(oid!(1, 3, 6, 1, 99, 1, 6, 1), Value::EndOfMibView)
                .build(b"public"),
        );

        let rows = mock_client(mock)
            .get_table_as_strings(&columns())
            .await
            .unwrap();
        assert_eq!(rows, vec![vec!["eth0".to_string(), "1500".to_string()]]);
    }
}
