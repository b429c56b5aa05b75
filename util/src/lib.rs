mod slice_iter;

pub use slice_iter::SliceIter;
