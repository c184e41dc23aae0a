//! Bounds-checked accessors over `[row][column]` matrices.
//!
//! Schedules and dispatch results are stored as `[tick][generator]`, so rows
//! select time and columns select generators.

use nalgebra::{DMatrix, Scalar};

use crate::core::error::{UcpError, UcpResult};

pub fn row<T: Scalar>(m: &DMatrix<T>, index: usize) -> UcpResult<Vec<T>> {
    check(index, m.nrows(), "row")?;
    Ok(m.row(index).iter().cloned().collect())
}

pub fn column<T: Scalar>(m: &DMatrix<T>, index: usize) -> UcpResult<Vec<T>> {
    check(index, m.ncols(), "column")?;
    Ok(m.column(index).iter().cloned().collect())
}

pub fn set_row<T: Scalar>(m: &mut DMatrix<T>, index: usize, values: &[T]) -> UcpResult<()> {
    check(index, m.nrows(), "row")?;
    check_len("row values", m.ncols(), values.len())?;
    for (j, v) in values.iter().enumerate() {
        m[(index, j)] = v.clone();
    }
    Ok(())
}

pub fn set_column<T: Scalar>(m: &mut DMatrix<T>, index: usize, values: &[T]) -> UcpResult<()> {
    check(index, m.ncols(), "column")?;
    check_len("column values", m.nrows(), values.len())?;
    for (i, v) in values.iter().enumerate() {
        m[(i, index)] = v.clone();
    }
    Ok(())
}

/// Element of a row-major grid stored as nested vectors.
pub fn cell<T>(grid: &[Vec<T>], row: usize, col: usize) -> UcpResult<&T> {
    let r = grid.get(row).ok_or(UcpError::IndexOutOfRange {
        axis: "row",
        index: row,
        len: grid.len(),
    })?;
    r.get(col).ok_or(UcpError::IndexOutOfRange {
        axis: "column",
        index: col,
        len: r.len(),
    })
}

fn check(index: usize, len: usize, axis: &'static str) -> UcpResult<()> {
    if index >= len {
        return Err(UcpError::IndexOutOfRange { axis, index, len });
    }
    Ok(())
}

fn check_len(name: &'static str, expected: usize, actual: usize) -> UcpResult<()> {
    if expected != actual {
        return Err(UcpError::LengthMismatch {
            name,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_names_the_axis() {
        let m = DMatrix::<u8>::zeros(2, 3);
        assert_eq!(
            column(&m, 3),
            Err(UcpError::IndexOutOfRange { axis: "column", index: 3, len: 3 })
        );
        assert_eq!(
            row(&m, 5),
            Err(UcpError::IndexOutOfRange { axis: "row", index: 5, len: 2 })
        );
    }

    #[test]
    fn set_then_get() {
        let mut m = DMatrix::<f64>::zeros(3, 2);
        set_column(&mut m, 1, &[1.0, 2.0, 3.0]).unwrap();
        set_row(&mut m, 0, &[9.0, 8.0]).unwrap();
        assert_eq!(column(&m, 1).unwrap(), vec![8.0, 2.0, 3.0]);
        assert!(set_row(&mut m, 0, &[1.0]).is_err());
    }
}
