//! Pair bookkeeping between steps

/// Symmetric bit matrix over body indices, without the diagonal
#[derive(Debug, Clone, Default)]
pub struct CollisionMatrix {
    bits: Vec<u64>,
    num_objects: usize,
}

impl CollisionMatrix {
    pub fn new(num_objects: usize) -> Self {
        let mut matrix = Self::default();
        matrix.set_num_objects(num_objects);
        matrix
    }

    #[inline]
    fn bit_index(i: usize, j: usize) -> Option<usize> {
        let (hi, lo) = if i > j { (i, j) } else { (j, i) };
        (hi != lo).then(|| hi * (hi - 1) / 2 + lo)
    }

    pub fn get(&self, i: usize, j: usize) -> bool {
        match Self::bit_index(i, j) {
            Some(k) if i < self.num_objects && j < self.num_objects => {
                self.bits[k / 64] & (1 << (k % 64)) != 0
            }
            _ => false,
        }
    }

    /// Set the pair bit. Out-of-range and diagonal pairs are ignored.
    pub fn set(&mut self, i: usize, j: usize, value: bool) {
        if i >= self.num_objects || j >= self.num_objects {
            return;
        }
        if let Some(k) = Self::bit_index(i, j) {
            if value {
                self.bits[k / 64] |= 1 << (k % 64);
            } else {
                self.bits[k / 64] &= !(1 << (k % 64));
            }
        }
    }

    /// Clear every pair
    pub fn reset(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
    }

    /// Resize for `n` objects; clears the matrix
    pub fn set_num_objects(&mut self, n: usize) {
        self.num_objects = n;
        let pairs = n * n.saturating_sub(1) / 2;
        self.bits.clear();
        self.bits.resize(pairs.div_ceil(64), 0);
    }

    #[inline]
    pub fn num_objects(&self) -> usize {
        self.num_objects
    }
}

/// Records which pairs overlapped this step and last step
#[derive(Debug, Clone)]
pub struct OverlapKeeper<K> {
    current: Vec<(K, K)>,
    previous: Vec<(K, K)>,
}

impl<K> Default for OverlapKeeper<K> {
    fn default() -> Self {
        Self {
            current: Vec::new(),
            previous: Vec::new(),
        }
    }
}

impl<K: Ord + Copy> OverlapKeeper<K> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn key(a: K, b: K) -> (K, K) {
        if a <= b { (a, b) } else { (b, a) }
    }

    /// Mark the unordered pair as overlapping in the current step
    pub fn set(&mut self, a: K, b: K) {
        let key = Self::key(a, b);
        if let Err(pos) = self.current.binary_search(&key) {
            self.current.insert(pos, key);
        }
    }

    pub fn contains(&self, a: K, b: K) -> bool {
        self.current.binary_search(&Self::key(a, b)).is_ok()
    }

    /// Start a new step: current becomes previous
    pub fn tick(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
        self.current.clear();
    }

    /// Pairs new this step and pairs gone since last step
    pub fn get_diff(&self, additions: &mut Vec<(K, K)>, removals: &mut Vec<(K, K)>) {
        additions.clear();
        removals.clear();
        let (mut i, mut j) = (0, 0);
        while i < self.current.len() && j < self.previous.len() {
            let (c, p) = (self.current[i], self.previous[j]);
            match c.cmp(&p) {
                std::cmp::Ordering::Less => {
                    additions.push(c);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    removals.push(p);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        additions.extend_from_slice(&self.current[i..]);
        removals.extend_from_slice(&self.previous[j..]);
    }

    /// Forget every pair, current and previous, matching `pred`
    pub fn purge(&mut self, mut pred: impl FnMut(&(K, K)) -> bool) {
        self.current.retain(|k| !pred(k));
        self.previous.retain(|k| !pred(k));
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}
