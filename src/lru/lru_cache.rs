use linked_hash_map::LinkedHashMap;

/// Returns the allocated memory in bytes.
pub trait ByteSize {
    /// Returns the amount of allocated memory in bytes.
    ///
    /// Note that most probably this is an approximation and not the exact byte value. However,
    /// it should represent the "largest" part of an instance. (E.g. for a string, this would
    /// be the bytes allocated on the heap and might discard the fields allocated on the stack
    /// used to store the length and capacity as well as the pointer itself.)
    fn allocated_size(&self) -> usize;
}

impl ByteSize for String {
    fn allocated_size(&self) -> usize {
        self.capacity()
    }
}

impl ByteSize for Vec<u8> {
    fn allocated_size(&self) -> usize {
        self.capacity()
    }
}

/// Provides a size constrained LRU cache.
///
/// The cache keeps track of the memory allocated by its keys and values. Once an insertion
/// pushes the accounted memory beyond **max_memory**, least recently used entries are evicted
/// until the constraint holds again. Reading an entry moves it to the most recently used
/// position, therefore hot keys stay resident regardless of their insertion order.
///
/// A **max_memory** of zero is permitted and yields a cache which retains nothing at all. This
/// is a deliberate degenerate configuration (effectively disabling caching), not an error.
///
/// # Examples
/// ```
/// # use peercache::lru::LruCache;
/// let mut lru = LruCache::new(20);
///
/// // "Foo" -> "Bar" accounts for 6 bytes (3 bytes of key, 3 bytes of value)...
/// lru.put("Foo".to_owned(), "Bar".to_owned());
/// assert_eq!(lru.get("Foo").unwrap(), &"Bar".to_owned());
///
/// // ...and the 8 bytes of "Foo1" -> "Bar1" still fit next to it.
/// lru.put("Foo1".to_owned(), "Bar1".to_owned());
/// assert_eq!(lru.get("Foo").is_some(), true);
/// assert_eq!(lru.get("Foo1").is_some(), true);
///
/// // This will hit the memory constraint and throw the least recently used entry out...
/// lru.put("Foo2".to_owned(), "Bar2".to_owned());
/// assert_eq!(lru.get("Foo").is_some(), false);
/// assert_eq!(lru.get("Foo1").is_some(), true);
/// assert_eq!(lru.get("Foo2").is_some(), true);
/// ```
pub struct LruCache<V: ByteSize> {
    allocated_memory: usize,
    max_memory: usize,
    reads: usize,
    hits: usize,
    writes: usize,
    map: LinkedHashMap<String, Entry<V>>,
}

struct Entry<V: ByteSize> {
    mem_size: usize,
    value: V,
}

impl<V: ByteSize> LruCache<V> {
    /// Creates a new cache which stores entries until they allocate **max_memory** of heap.
    pub fn new(max_memory: usize) -> Self {
        LruCache {
            allocated_memory: 0,
            max_memory,
            reads: 0,
            hits: 0,
            writes: 0,
            map: LinkedHashMap::new(),
        }
    }

    /// Stores the given value for the given key.
    ///
    /// If the key is already present, its value and size accounting are replaced and the entry
    /// is treated as most recently used. After the insertion, least recently used entries are
    /// evicted while the accounted memory exceeds **max_memory**. Note that this never fails:
    /// an entry which is larger than the whole cache is simply evicted right away.
    ///
    /// # Examples
    /// ```
    /// # use peercache::lru::LruCache;
    /// let mut lru = LruCache::new(1024);
    ///
    /// lru.put("Foo".to_owned(), "Bar".to_owned());
    /// assert_eq!(lru.get("Foo").unwrap(), &"Bar".to_owned());
    /// ```
    pub fn put(&mut self, key: String, value: V) {
        let entry = Entry {
            mem_size: key.len() + value.allocated_size(),
            value,
        };

        let mut delta_mem = entry.mem_size as isize;
        if let Some(stale_entry) = self.map.insert(key, entry) {
            delta_mem -= stale_entry.mem_size as isize;
        }

        self.writes += 1;
        self.allocated_memory = (self.allocated_memory as isize + delta_mem) as usize;

        self.enforce_constraints();
    }

    fn enforce_constraints(&mut self) {
        while self.allocated_memory > self.max_memory {
            match self.map.pop_front() {
                Some((_, lru_entry)) => {
                    self.allocated_memory -= lru_entry.mem_size;
                }
                None => break,
            }
        }
    }

    /// Returns the value which has previously been stored for the given key or **None** if
    /// no value is present.
    ///
    /// A successful read moves the entry to the most recently used position.
    ///
    /// # Examples
    /// ```
    /// # use peercache::lru::LruCache;
    /// let mut lru = LruCache::new(1024);
    ///
    /// lru.put("Foo".to_owned(), "Bar".to_owned());
    /// assert_eq!(lru.get("Foo").unwrap(), &"Bar".to_owned());
    /// assert_eq!(lru.get("Unknown"), None);
    /// ```
    pub fn get(&mut self, key: &str) -> Option<&V> {
        self.reads += 1;

        match self.map.get_refresh(key) {
            Some(entry) => {
                self.hits += 1;
                Some(&entry.value)
            }
            None => None,
        }
    }

    /// Removes the entry for the given key if present.
    pub fn remove(&mut self, key: &str) {
        self.writes += 1;

        if let Some(entry) = self.map.remove(key) {
            self.allocated_memory -= entry.mem_size;
        }
    }

    /// Removes all entries in this cache.
    ///
    /// Note that this will also zero all metrics (reads, writes, cache hits).
    pub fn flush(&mut self) {
        self.map.clear();
        self.allocated_memory = 0;
        self.reads = 0;
        self.writes = 0;
        self.hits = 0;
    }

    /// Returns the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Determines if the cache is completely empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the maximal amount of memory to be (roughly) occupied by this cache.
    pub fn max_memory(&self) -> usize {
        self.max_memory
    }

    /// Specifies the maximal amount of memory to be (roughly) occupied by this cache.
    ///
    /// Shrinking the limit immediately evicts entries until the new constraint holds.
    ///
    /// # Examples
    /// ```
    /// # use peercache::lru::LruCache;
    /// let mut lru = LruCache::new(1024);
    /// lru.put("Foo0".to_owned(), "Bar0".to_owned());
    /// lru.put("Foo1".to_owned(), "Bar1".to_owned());
    /// lru.put("Foo2".to_owned(), "Bar2".to_owned());
    /// assert_eq!(lru.len(), 3);
    ///
    /// // Now request that the cache is reduced to 16 bytes...
    /// lru.set_max_memory(16);
    ///
    /// // ...this will kick each but the latest two entries out of the cache.
    /// assert_eq!(lru.len(), 2);
    /// ```
    pub fn set_max_memory(&mut self, max_memory: usize) {
        let previous_max_memory = self.max_memory;
        self.max_memory = max_memory;
        if previous_max_memory > self.max_memory {
            self.enforce_constraints();
        }
    }

    /// Returns the amount of memory allocated to store the keys and values of this cache.
    ///
    /// The returned value is in bytes. Note that this is most probably a rough estimate but
    /// should account for the largest part of allocated memory.
    pub fn allocated_memory(&self) -> usize {
        self.allocated_memory
    }

    /// Returns the memory utilization in percent.
    pub fn memory_utilization(&self) -> f32 {
        self.allocated_memory as f32 / self.max_memory as f32 * 100.
    }

    /// Returns the cache hit rate in percent.
    ///
    /// Note that all metrics are reset when **flush()** is called.
    pub fn hit_rate(&self) -> f32 {
        match self.reads {
            0 => 0.,
            n => self.hits as f32 / n as f32 * 100.,
        }
    }

    /// Returns the total number of reads performed on this cache since the last flush.
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Returns the total number of writes performed on this cache since the last flush.
    pub fn writes(&self) -> usize {
        self.writes
    }
}
